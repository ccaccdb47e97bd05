use std::sync::{Arc, Mutex, PoisonError};

use crate::shared::frame::Frame;

/// Latest-frame slot written by a stream and read by the surface.
///
/// Only the newest frame is kept; older frames are dropped on publish.
#[derive(Default)]
pub struct FrameFeed {
    latest: Mutex<Option<Frame>>,
}

impl FrameFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    pub fn latest(&self) -> Option<Frame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The element a live stream renders into.
///
/// Reports the current frame and its dimensions on demand. Detached
/// surfaces report nothing.
#[derive(Default)]
pub struct VideoSurface {
    source: Mutex<Option<Arc<FrameFeed>>>,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, feed: Arc<FrameFeed>) {
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(feed);
    }

    pub fn detach(&self) {
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn current_frame(&self) -> Option<Frame> {
        let feed = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        feed.latest()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.current_frame().map(|f| (f.width(), f.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_keeps_only_latest_frame() {
        let feed = FrameFeed::new();
        feed.publish(Frame::solid(2, 2, [1, 1, 1]));
        feed.publish(Frame::solid(4, 4, [2, 2, 2]));

        let latest = feed.latest().unwrap();
        assert_eq!(latest.width(), 4);
        assert_eq!(latest.pixel(0, 0), &[2, 2, 2]);
    }

    #[test]
    fn test_detached_surface_reports_nothing() {
        let surface = VideoSurface::new();
        assert!(!surface.is_attached());
        assert!(surface.current_frame().is_none());
        assert!(surface.dimensions().is_none());
    }

    #[test]
    fn test_attached_surface_reads_feed() {
        let feed = Arc::new(FrameFeed::new());
        let surface = VideoSurface::new();
        surface.attach(feed.clone());
        assert!(surface.is_attached());
        assert!(surface.current_frame().is_none());

        feed.publish(Frame::solid(640, 480, [0, 0, 0]));
        assert_eq!(surface.dimensions(), Some((640, 480)));

        surface.detach();
        assert!(surface.current_frame().is_none());
    }
}
