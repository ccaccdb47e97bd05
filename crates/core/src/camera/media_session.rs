use std::future::Future;
use std::sync::Arc;

use crate::camera::domain::camera_device::{CameraDevice, CameraError, StreamHandle};
use crate::camera::domain::video_surface::VideoSurface;

/// Owns the camera stream and the surface it renders into.
///
/// At most one stream is held at a time. Dropping the session releases it.
pub struct MediaSession {
    device: Arc<dyn CameraDevice>,
    stream: Option<Arc<dyn StreamHandle>>,
    surface: Arc<VideoSurface>,
}

impl MediaSession {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            stream: None,
            surface: Arc::new(VideoSurface::new()),
        }
    }

    pub fn surface(&self) -> Arc<VideoSurface> {
        self.surface.clone()
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    pub fn describe_device(&self) -> String {
        self.device.describe()
    }

    /// Opens the device on the blocking pool. The returned stream is not
    /// attached yet; pass it to [`attach`](Self::attach).
    pub fn acquire(
        &self,
    ) -> impl Future<Output = Result<Arc<dyn StreamHandle>, CameraError>> + Send + 'static {
        let device = self.device.clone();
        async move {
            tokio::task::spawn_blocking(move || device.request_stream())
                .await
                .map_err(|e| CameraError::Unavailable(format!("camera task failed: {e}")))?
        }
    }

    /// Takes ownership of an acquired stream and shows it on the surface.
    ///
    /// Returns `false` (and releases `stream`) when a stream is already held.
    pub fn attach(&mut self, stream: Arc<dyn StreamHandle>) -> bool {
        if self.stream.is_some() {
            log::warn!("Camera already live, releasing duplicate stream");
            stream.release();
            return false;
        }
        self.surface.attach(stream.feed());
        self.stream = Some(stream);
        true
    }

    /// Acquires and attaches a stream. No-op while already live.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        if self.is_live() {
            return Ok(());
        }
        let stream = self.acquire().await?;
        self.attach(stream);
        Ok(())
    }

    /// Releases the held stream, if any, and detaches the surface.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.release();
            log::info!("Camera released");
        }
        self.surface.detach();
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::camera::domain::video_surface::FrameFeed;
    use crate::shared::frame::Frame;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Camera stub that counts opened and released streams.
    pub(crate) struct CountingCamera {
        pub opened: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
        pub deny: AtomicBool,
        pub frame: Option<Frame>,
    }

    impl CountingCamera {
        pub fn new(frame: Option<Frame>) -> Self {
            Self {
                opened: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
                deny: AtomicBool::new(false),
                frame,
            }
        }

        pub fn denying() -> Self {
            let camera = Self::new(None);
            camera.deny.store(true, Ordering::SeqCst);
            camera
        }

        pub fn live_streams(&self) -> usize {
            self.opened.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
        }
    }

    struct CountingStream {
        feed: Arc<FrameFeed>,
        released: Arc<AtomicUsize>,
        active: AtomicBool,
    }

    impl StreamHandle for CountingStream {
        fn feed(&self) -> Arc<FrameFeed> {
            self.feed.clone()
        }

        fn release(&self) {
            if self.active.swap(false, Ordering::SeqCst) {
                self.released.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    impl CameraDevice for CountingCamera {
        fn request_stream(&self) -> Result<Arc<dyn StreamHandle>, CameraError> {
            if self.deny.load(Ordering::SeqCst) {
                return Err(CameraError::PermissionDenied("denied by test".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            let feed = Arc::new(FrameFeed::new());
            if let Some(frame) = &self.frame {
                feed.publish(frame.clone());
            }
            Ok(Arc::new(CountingStream {
                feed,
                released: self.released.clone(),
                active: AtomicBool::new(true),
            }))
        }

        fn describe(&self) -> String {
            "counting test camera".into()
        }
    }

    fn camera() -> Arc<CountingCamera> {
        Arc::new(CountingCamera::new(Some(Frame::solid(640, 480, [0, 0, 0]))))
    }

    #[tokio::test]
    async fn test_start_holds_exactly_one_stream() {
        let camera = camera();
        let mut session = MediaSession::new(camera.clone());

        session.start().await.unwrap();

        assert!(session.is_live());
        assert!(session.surface().is_attached());
        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_start_while_live_opens_nothing() {
        let camera = camera();
        let mut session = MediaSession::new(camera.clone());

        session.start().await.unwrap();
        session.start().await.unwrap();

        assert_eq!(camera.opened.load(Ordering::SeqCst), 1);
        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_attach_rejects_duplicate_stream() {
        let camera = camera();
        let mut session = MediaSession::new(camera.clone());

        let first = session.acquire().await.unwrap();
        let second = session.acquire().await.unwrap();
        assert!(session.attach(first));
        assert!(!session.attach(second));

        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let camera = camera();
        let mut session = MediaSession::new(camera.clone());
        session.start().await.unwrap();

        session.stop();
        session.stop();

        assert!(!session.is_live());
        assert!(!session.surface().is_attached());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_denied_start_holds_nothing() {
        let camera = Arc::new(CountingCamera::denying());
        let mut session = MediaSession::new(camera.clone());

        let result = session.start().await;

        assert!(matches!(result, Err(CameraError::PermissionDenied(_))));
        assert!(!session.is_live());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let camera = camera();
        {
            let mut session = MediaSession::new(camera.clone());
            session.start().await.unwrap();
        }
        assert_eq!(camera.live_streams(), 0);
    }
}
