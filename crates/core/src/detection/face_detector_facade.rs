use std::sync::Arc;

use crate::detection::domain::detector_environment::DetectorEnvironment;
use crate::detection::domain::errors::DetectionError;
use crate::detection::domain::face_detector::{DetectionOptions, ModelBackend};
use crate::detection::domain::model_state::ModelState;
use crate::detection::infrastructure::lazy_model::LazyModel;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Which backend serves a detection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStrategy {
    Native,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Faces(Vec<BoundingBox>),
    NoFace,
}

impl DetectionOutcome {
    fn from_boxes(boxes: impl IntoIterator<Item = BoundingBox>) -> Self {
        let boxes: Vec<_> = boxes.into_iter().filter(|b| !b.is_empty()).collect();
        if boxes.is_empty() {
            Self::NoFace
        } else {
            Self::Faces(boxes)
        }
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        match self {
            Self::Faces(boxes) => boxes,
            Self::NoFace => &[],
        }
    }
}

/// One face detection capability over two backends.
///
/// The host's native detector is used when the environment offers one;
/// otherwise the model backend, loaded on first use. Clones share the same
/// model, so the process loads it at most once.
#[derive(Clone)]
pub struct FaceDetectorFacade {
    environment: Arc<dyn DetectorEnvironment>,
    model: Arc<LazyModel>,
    options: DetectionOptions,
}

impl FaceDetectorFacade {
    pub fn new(
        environment: Arc<dyn DetectorEnvironment>,
        backend: Arc<dyn ModelBackend>,
        options: DetectionOptions,
    ) -> Self {
        Self {
            environment,
            model: Arc::new(LazyModel::new(backend)),
            options,
        }
    }

    pub fn strategy(&self) -> DetectionStrategy {
        if self.environment.native_detector().is_some() {
            DetectionStrategy::Native
        } else {
            DetectionStrategy::Model
        }
    }

    /// True when a detection started now would first have to load the model.
    pub fn will_load_model(&self) -> bool {
        self.strategy() == DetectionStrategy::Model && self.model.state().needs_load()
    }

    pub fn model_state(&self) -> ModelState {
        self.model.state()
    }

    pub fn model_load_attempts(&self) -> usize {
        self.model.load_attempts()
    }

    pub async fn detect(&self, frame: &Frame) -> Result<DetectionOutcome, DetectionError> {
        if let Some(native) = self.environment.native_detector() {
            log::debug!("Detecting faces with the native detector");
            let detections = native
                .detect(frame)
                .map_err(|e| DetectionError::Native(e.to_string()))?;
            return Ok(DetectionOutcome::from_boxes(
                detections.into_iter().map(|d| d.bounding_box),
            ));
        }

        log::debug!("Detecting faces with the model backend");
        let model = self.model.get().await?;
        let frame = frame.clone();
        let options = self.options;
        let detections = tokio::task::spawn_blocking(move || {
            model
                .detect_all(&frame, &options)
                .map_err(|e| DetectionError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| DetectionError::Task(e.to_string()))??;

        Ok(DetectionOutcome::from_boxes(
            detections
                .into_iter()
                .map(|d| d.detection_box.to_bounding_box()),
        ))
    }
}
