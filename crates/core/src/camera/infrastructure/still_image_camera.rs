use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::domain::camera_device::{CameraDevice, CameraError, StreamHandle};
use crate::camera::domain::video_surface::FrameFeed;
use crate::shared::frame::Frame;

enum StillSource {
    File(PathBuf),
    Frame(Frame),
}

/// A camera whose stream shows one still picture.
///
/// Stands in for real hardware when capturing from an image file on the
/// command line, and in tests.
pub struct StillImageCamera {
    source: StillSource,
}

impl StillImageCamera {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: StillSource::File(path.into()),
        }
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self {
            source: StillSource::Frame(frame),
        }
    }

    fn load(&self) -> Result<Frame, CameraError> {
        match &self.source {
            StillSource::Frame(frame) => Ok(frame.clone()),
            StillSource::File(path) => load_image(path),
        }
    }
}

fn load_image(path: &Path) -> Result<Frame, CameraError> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            CameraError::PermissionDenied(format!("{}: {io}", path.display()))
        }
        other => CameraError::Unavailable(format!("{}: {other}", path.display())),
    })?;
    Ok(Frame::from_rgb_image(image.to_rgb8(), 0))
}

impl CameraDevice for StillImageCamera {
    fn request_stream(&self) -> Result<Arc<dyn StreamHandle>, CameraError> {
        let frame = self.load()?;
        let feed = Arc::new(FrameFeed::new());
        feed.publish(frame);
        Ok(Arc::new(StillImageStream {
            feed,
            active: AtomicBool::new(true),
        }))
    }

    fn describe(&self) -> String {
        match &self.source {
            StillSource::File(path) => format!("still image {}", path.display()),
            StillSource::Frame(frame) => {
                format!("still frame {}x{}", frame.width(), frame.height())
            }
        }
    }
}

struct StillImageStream {
    feed: Arc<FrameFeed>,
    active: AtomicBool,
}

impl StreamHandle for StillImageStream {
    fn feed(&self) -> Arc<FrameFeed> {
        self.feed.clone()
    }

    fn release(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
