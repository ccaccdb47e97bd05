use std::sync::Arc;

use crate::detection::domain::face_detector::NativeFaceDetector;

/// Capability probe for host-provided face detection.
pub trait DetectorEnvironment: Send + Sync {
    fn native_detector(&self) -> Option<Arc<dyn NativeFaceDetector>>;
}

/// The environment the process actually runs in.
#[derive(Clone, Default)]
pub struct HostEnvironment {
    native: Option<Arc<dyn NativeFaceDetector>>,
}

impl HostEnvironment {
    /// No host detector; detection always goes through the model.
    pub fn without_native() -> Self {
        Self { native: None }
    }

    pub fn with_native(detector: Arc<dyn NativeFaceDetector>) -> Self {
        Self {
            native: Some(detector),
        }
    }
}

impl DetectorEnvironment for HostEnvironment {
    fn native_detector(&self) -> Option<Arc<dyn NativeFaceDetector>> {
        self.native.clone()
    }
}
