use std::sync::Arc;

use thiserror::Error;

use crate::camera::domain::video_surface::FrameFeed;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// A source of live video, e.g. a webcam.
///
/// `request_stream` blocks until the device is streaming or has refused;
/// callers run it off the UI thread.
pub trait CameraDevice: Send + Sync {
    fn request_stream(&self) -> Result<Arc<dyn StreamHandle>, CameraError>;

    /// Human-readable device description for logs.
    fn describe(&self) -> String;
}

/// Handle to an active camera stream.
///
/// Implementations must also release on drop so a handle that goes out of
/// reach never keeps the hardware busy.
pub trait StreamHandle: Send + Sync {
    /// Latest-frame slot the stream publishes into.
    fn feed(&self) -> Arc<FrameFeed>;

    /// Stops all tracks. Idempotent.
    fn release(&self);

    fn is_active(&self) -> bool;
}
