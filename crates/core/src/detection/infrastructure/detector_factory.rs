use std::sync::Arc;

use crate::detection::domain::detector_environment::{DetectorEnvironment, HostEnvironment};
use crate::detection::domain::face_detector::DetectionOptions;
use crate::detection::face_detector_facade::FaceDetectorFacade;
use crate::shared::config::DetectionConfig;

use super::onnx_blazeface_model::BlazefaceBackend;

/// Builds the facade for this host, with BlazeFace as the model backend.
pub fn create_facade(config: &DetectionConfig) -> FaceDetectorFacade {
    create_facade_in(Arc::new(HostEnvironment::without_native()), config)
}

/// Same as [`create_facade`] but probing the given environment.
pub fn create_facade_in(
    environment: Arc<dyn DetectorEnvironment>,
    config: &DetectionConfig,
) -> FaceDetectorFacade {
    let facade = FaceDetectorFacade::new(
        environment,
        Arc::new(BlazefaceBackend::new(config.clone())),
        DetectionOptions {
            min_confidence: config.min_confidence,
            max_results: config.max_results,
        },
    );
    log::info!(
        "Face detection via {:?} backend (model {})",
        facade.strategy(),
        config.model_dir.join(&config.model_name).display()
    );
    facade
}
