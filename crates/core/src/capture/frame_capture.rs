use thiserror::Error;

use crate::camera::domain::video_surface::VideoSurface;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no live video surface is attached")]
    NoVideoSurface,
    #[error("the camera has not produced a frame yet")]
    NoFrame,
    #[error("unsupported frame layout: {0} channels (expected RGB or RGBA)")]
    UnsupportedFormat(u8),
    #[error("failed to encode captured image: {0}")]
    Encode(String),
    #[error("failed to write captured image: {0}")]
    Write(String),
}

/// Snapshots the live surface into a new raster of the same size.
///
/// Leaves the media session untouched; the caller decides when to stop it.
pub fn capture_frame(surface: &VideoSurface) -> Result<Frame, CaptureError> {
    if !surface.is_attached() {
        return Err(CaptureError::NoVideoSurface);
    }
    let frame = surface.current_frame().ok_or(CaptureError::NoFrame)?;
    if frame.is_empty() {
        return Err(CaptureError::NoFrame);
    }
    if !matches!(frame.channels(), 3 | 4) {
        return Err(CaptureError::UnsupportedFormat(frame.channels()));
    }
    log::debug!(
        "Captured frame #{} at {}x{}",
        frame.sequence(),
        frame.width(),
        frame.height()
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::video_surface::FrameFeed;
    use std::sync::Arc;

    #[test]
    fn test_detached_surface_fails() {
        let surface = VideoSurface::new();
        assert_eq!(capture_frame(&surface), Err(CaptureError::NoVideoSurface));
    }

    #[test]
    fn test_surface_without_frames_fails() {
        let surface = VideoSurface::new();
        surface.attach(Arc::new(FrameFeed::new()));
        assert_eq!(capture_frame(&surface), Err(CaptureError::NoFrame));
    }

    #[test]
    fn test_gray_frame_is_rejected() {
        let feed = Arc::new(FrameFeed::new());
        let surface = VideoSurface::new();
        surface.attach(feed.clone());
        feed.publish(Frame::new(vec![0; 8 * 8], 8, 8, 1, 0));

        assert_eq!(
            capture_frame(&surface),
            Err(CaptureError::UnsupportedFormat(1))
        );
    }

    #[test]
    fn test_copies_current_frame_at_full_size() {
        let feed = Arc::new(FrameFeed::new());
        let surface = VideoSurface::new();
        surface.attach(feed.clone());
        feed.publish(Frame::solid(640, 480, [7, 8, 9]));

        let frame = capture_frame(&surface).unwrap();
        feed.publish(Frame::solid(320, 240, [0, 0, 0]));

        assert_eq!((frame.width(), frame.height()), (640, 480));
        assert_eq!(frame.pixel(639, 479), &[7, 8, 9]);
    }
}
