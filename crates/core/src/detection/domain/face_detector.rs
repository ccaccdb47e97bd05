use std::sync::Arc;

use crate::detection::domain::errors::ModelLoadError;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Box as reported by the model backend, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ModelBox {
    pub fn to_bounding_box(self) -> BoundingBox {
        BoundingBox::new(self.left, self.top, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDetection {
    pub detection_box: ModelBox,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeDetection {
    pub bounding_box: BoundingBox,
}

/// Filtering applied by the model backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    pub min_confidence: f32,
    pub max_results: usize,
}

/// A face detector provided by the host platform. Assumed always ready.
pub trait NativeFaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<NativeDetection>, BackendError>;
}

/// A loaded face detection model.
///
/// `detect_all` blocks; callers run it off the async executor.
pub trait DetectionModel: Send + Sync {
    fn detect_all(
        &self,
        frame: &Frame,
        options: &DetectionOptions,
    ) -> Result<Vec<ModelDetection>, BackendError>;
}

/// Produces a [`DetectionModel`]. Loading may block on disk or network.
pub trait ModelBackend: Send + Sync {
    fn load_model(&self) -> Result<Arc<dyn DetectionModel>, ModelLoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_box_maps_field_for_field() {
        let model_box = ModelBox {
            left: 10.0,
            top: 20.0,
            width: 100.0,
            height: 120.0,
        };
        assert_eq!(
            model_box.to_bounding_box(),
            BoundingBox::new(10.0, 20.0, 100.0, 120.0)
        );
    }
}
