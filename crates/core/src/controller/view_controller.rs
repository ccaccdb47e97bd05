use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

use crate::camera::domain::camera_device::{CameraDevice, CameraError, StreamHandle};
use crate::camera::domain::video_surface::VideoSurface;
use crate::camera::media_session::MediaSession;
use crate::capture::captured_image::CapturedImage;
use crate::capture::frame_capture::{capture_frame, CaptureError};
use crate::controller::phase::UiPhase;
use crate::controller::status_message::StatusMessage;
use crate::detection::domain::errors::DetectionError;
use crate::detection::face_detector_facade::{DetectionOutcome, FaceDetectorFacade};
use crate::detection::infrastructure::detector_factory::create_facade;
use crate::overlay::overlay_renderer::{OverlayRenderer, OverlayStyle};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::FacecamConfig;
use crate::shared::constants::CAMERA_ALERT;
use crate::shared::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOperation {
    Starting,
    Capturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Capture,
    Close,
    Retake,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("cannot {action:?} while {phase}")]
    InvalidTransition { action: Action, phase: UiPhase },
    #[error("{0:?} is still in progress")]
    Busy(PendingOperation),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// What happened to an outcome handed back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The outcome belonged to a superseded request and was dropped.
    Discarded,
}

/// A camera acquisition handed out by [`ViewController::begin_start`].
pub struct StartRequest {
    generation: u64,
    acquire: BoxFuture<'static, Result<Arc<dyn StreamHandle>, CameraError>>,
}

impl StartRequest {
    pub fn run(self) -> impl Future<Output = StartOutcome> + Send + 'static {
        let generation = self.generation;
        self.acquire
            .map(move |result| StartOutcome { generation, result })
    }
}

#[derive(Clone)]
pub struct StartOutcome {
    generation: u64,
    result: Result<Arc<dyn StreamHandle>, CameraError>,
}

impl fmt::Debug for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOutcome")
            .field("generation", &self.generation)
            .field("result", &self.result.as_ref().map(|_| "stream"))
            .finish()
    }
}

/// Detection, overlay and freezing for one snapshot, detached from the
/// controller so it can run on the executor.
pub struct CaptureRequest {
    generation: u64,
    frame: Frame,
    detector: Option<FaceDetectorFacade>,
    style: OverlayStyle,
}

impl CaptureRequest {
    pub fn run(self) -> impl Future<Output = CaptureOutcome> + Send + 'static {
        async move {
            let mut frame = self.frame;
            let detection = match &self.detector {
                Some(detector) => Some(detector.detect(&frame).await),
                None => None,
            };
            if let Some(Ok(outcome)) = &detection {
                OverlayRenderer::new(self.style).draw(outcome.boxes(), &mut frame);
            }
            CaptureOutcome {
                generation: self.generation,
                image: CapturedImage::freeze(&frame),
                detection,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    generation: u64,
    image: Result<CapturedImage, CaptureError>,
    detection: Option<Result<DetectionOutcome, DetectionError>>,
}

/// The Idle / Live / Captured state machine behind the camera view.
///
/// Every asynchronous step is split into `begin_*` (validates and hands out
/// a request), the request's `run()` future, and `finish_*` (applies the
/// outcome). Each begin and every close bumps the generation; outcomes from
/// older generations are discarded, and a discarded stream is released.
pub struct ViewController {
    session: MediaSession,
    detector: FaceDetectorFacade,
    style: OverlayStyle,
    detection_enabled: bool,
    phase: UiPhase,
    pending: Option<PendingOperation>,
    generation: u64,
    image: Option<CapturedImage>,
    boxes: Vec<BoundingBox>,
    status: Option<StatusMessage>,
    alert: Option<String>,
}

impl ViewController {
    pub fn new(
        device: Arc<dyn CameraDevice>,
        detector: FaceDetectorFacade,
        style: OverlayStyle,
    ) -> Self {
        Self {
            session: MediaSession::new(device),
            detector,
            style,
            detection_enabled: true,
            phase: UiPhase::Idle,
            pending: None,
            generation: 0,
            image: None,
            boxes: Vec::new(),
            status: None,
            alert: None,
        }
    }

    pub fn from_config(device: Arc<dyn CameraDevice>, config: &FacecamConfig) -> Self {
        let mut controller = Self::new(device, create_facade(&config.detection), config.overlay);
        controller.set_detection_enabled(config.detection.enabled);
        controller
    }

    pub fn phase(&self) -> UiPhase {
        self.phase
    }

    pub fn pending(&self) -> Option<PendingOperation> {
        self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn surface(&self) -> Arc<VideoSurface> {
        self.session.surface()
    }

    pub fn is_camera_live(&self) -> bool {
        self.session.is_live()
    }

    pub fn camera_name(&self) -> String {
        self.session.describe_device()
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.image.as_ref()
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn status(&self) -> Option<StatusMessage> {
        self.status
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Returns the pending alert once, for UIs that show it as a dialog.
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn detector(&self) -> &FaceDetectorFacade {
        &self.detector
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }

    /// Takes effect from the next capture.
    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.detection_enabled = enabled;
    }

    pub fn begin_start(&mut self) -> Result<StartRequest, ControllerError> {
        self.guard(Action::Start, UiPhase::Idle)?;
        self.alert = None;
        Ok(self.issue_start())
    }

    /// Drops the photo and its results, then asks for the camera again.
    pub fn begin_retake(&mut self) -> Result<StartRequest, ControllerError> {
        self.guard(Action::Retake, UiPhase::Captured)?;
        self.image = None;
        self.boxes.clear();
        self.status = None;
        self.phase = UiPhase::Idle;
        Ok(self.issue_start())
    }

    fn issue_start(&mut self) -> StartRequest {
        self.generation += 1;
        self.pending = Some(PendingOperation::Starting);
        StartRequest {
            generation: self.generation,
            acquire: self.session.acquire().boxed(),
        }
    }

    pub fn finish_start(&mut self, outcome: StartOutcome) -> Result<Completion, ControllerError> {
        if !self.is_current(outcome.generation, PendingOperation::Starting) {
            log::debug!("Discarding stale camera start (generation {})", outcome.generation);
            if let Ok(stream) = outcome.result {
                stream.release();
            }
            return Ok(Completion::Discarded);
        }
        self.pending = None;

        match outcome.result {
            Ok(stream) => {
                self.session.attach(stream);
                self.phase = UiPhase::Live;
                log::info!("Camera live: {}", self.session.describe_device());
                Ok(Completion::Applied)
            }
            Err(e) => {
                log::error!("Camera start failed: {e}");
                self.alert = Some(CAMERA_ALERT.to_string());
                Err(e.into())
            }
        }
    }

    /// Snapshots the preview. Fails synchronously when there is nothing to
    /// capture; the camera stays live in that case.
    pub fn begin_capture(&mut self) -> Result<CaptureRequest, ControllerError> {
        self.guard(Action::Capture, UiPhase::Live)?;
        let frame = match capture_frame(&self.session.surface()) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Capture failed: {e}");
                self.status = Some(StatusMessage::CaptureFailed);
                return Err(e.into());
            }
        };

        self.generation += 1;
        self.pending = Some(PendingOperation::Capturing);
        self.status = if !self.detection_enabled {
            None
        } else if self.detector.will_load_model() {
            Some(StatusMessage::LoadingModel)
        } else {
            Some(StatusMessage::Detecting)
        };

        Ok(CaptureRequest {
            generation: self.generation,
            frame,
            detector: self.detection_enabled.then(|| self.detector.clone()),
            style: self.style,
        })
    }

    pub fn finish_capture(
        &mut self,
        outcome: CaptureOutcome,
    ) -> Result<Completion, ControllerError> {
        if !self.is_current(outcome.generation, PendingOperation::Capturing) {
            log::debug!("Discarding stale capture (generation {})", outcome.generation);
            return Ok(Completion::Discarded);
        }
        self.pending = None;

        let image = match outcome.image {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Captured frame could not be frozen: {e}");
                self.status = Some(StatusMessage::CaptureFailed);
                return Err(e.into());
            }
        };

        (self.boxes, self.status) = match outcome.detection {
            None => (Vec::new(), None),
            Some(Ok(DetectionOutcome::NoFace)) => (Vec::new(), Some(StatusMessage::NoFace)),
            Some(Ok(DetectionOutcome::Faces(boxes))) => {
                let count = boxes.len();
                (boxes, Some(StatusMessage::FacesDetected(count)))
            }
            Some(Err(e)) => {
                log::warn!("Face detection failed, keeping the plain photo: {e}");
                (Vec::new(), Some(StatusMessage::DetectionFailed))
            }
        };
        self.image = Some(image);
        self.session.stop();
        self.phase = UiPhase::Captured;
        Ok(Completion::Applied)
    }

    /// Stops the camera. Also cancels a start or capture in flight.
    pub fn close(&mut self) -> Result<(), ControllerError> {
        let starting = self.pending == Some(PendingOperation::Starting);
        if self.phase != UiPhase::Live && !starting {
            return Err(ControllerError::InvalidTransition {
                action: Action::Close,
                phase: self.phase,
            });
        }
        self.generation += 1;
        self.pending = None;
        self.status = None;
        self.session.stop();
        self.phase = UiPhase::Idle;
        Ok(())
    }

    pub async fn start(&mut self) -> Result<Completion, ControllerError> {
        let request = self.begin_start()?;
        let outcome = request.run().await;
        self.finish_start(outcome)
    }

    pub async fn retake(&mut self) -> Result<Completion, ControllerError> {
        let request = self.begin_retake()?;
        let outcome = request.run().await;
        self.finish_start(outcome)
    }

    pub async fn capture(&mut self) -> Result<Completion, ControllerError> {
        let request = self.begin_capture()?;
        let outcome = request.run().await;
        self.finish_capture(outcome)
    }

    fn guard(&self, action: Action, required: UiPhase) -> Result<(), ControllerError> {
        if let Some(pending) = self.pending {
            return Err(ControllerError::Busy(pending));
        }
        if self.phase != required {
            return Err(ControllerError::InvalidTransition {
                action,
                phase: self.phase,
            });
        }
        Ok(())
    }

    fn is_current(&self, generation: u64, expected: PendingOperation) -> bool {
        generation == self.generation && self.pending == Some(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::media_session::tests::CountingCamera;
    use crate::detection::domain::model_state::ModelState;
    use crate::detection::face_detector_facade::tests::model_facade;
    use crate::detection::infrastructure::lazy_model::tests::{detection, SlowBackend};
    use std::sync::atomic::Ordering;

    const RED: [u8; 3] = [255, 0, 0];

    fn live_camera() -> Arc<CountingCamera> {
        Arc::new(CountingCamera::new(Some(Frame::solid(640, 480, [0, 0, 0]))))
    }

    fn one_face_backend() -> Arc<SlowBackend> {
        Arc::new(SlowBackend::new(vec![detection(10.0, 20.0, 100.0, 120.0)]))
    }

    fn controller(camera: Arc<CountingCamera>, backend: Arc<SlowBackend>) -> ViewController {
        ViewController::new(camera, model_facade(backend), OverlayStyle::default())
    }

    #[tokio::test]
    async fn test_capture_with_model_fallback_draws_one_face() {
        let camera = live_camera();
        let backend = one_face_backend();
        let mut controller = controller(camera.clone(), backend.clone());

        controller.start().await.unwrap();
        assert_eq!(controller.phase(), UiPhase::Live);
        assert_eq!(controller.detector().model_state(), ModelState::NotLoaded);

        let request = controller.begin_capture().unwrap();
        assert_eq!(controller.status(), Some(StatusMessage::LoadingModel));
        let outcome = request.run().await;
        assert_eq!(controller.finish_capture(outcome), Ok(Completion::Applied));

        assert_eq!(controller.phase(), UiPhase::Captured);
        assert_eq!(
            controller.boxes(),
            &[BoundingBox::new(10.0, 20.0, 100.0, 120.0)]
        );
        assert_eq!(
            controller.status().map(|s| s.to_string()).as_deref(),
            Some("1 face detected.")
        );
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);

        let image = controller.captured_image().unwrap();
        assert_eq!((image.width(), image.height()), (640, 480));
        let pixels = image.decode().unwrap();
        assert_eq!(pixels.get_pixel(10, 20).0, RED);
        assert_eq!(pixels.get_pixel(60, 80).0, [0, 0, 0]);
    }

    #[tokio::test]
    async fn test_capture_leaves_no_active_stream() {
        let camera = live_camera();
        let mut controller = controller(camera.clone(), one_face_backend());

        controller.start().await.unwrap();
        assert_eq!(camera.live_streams(), 1);
        controller.capture().await.unwrap();

        assert_eq!(controller.phase(), UiPhase::Captured);
        assert!(!controller.is_camera_live());
        assert!(!controller.surface().is_attached());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle_with_alert() {
        let camera = Arc::new(CountingCamera::denying());
        let mut controller = controller(camera.clone(), one_face_backend());

        let result = controller.start().await;

        assert!(matches!(
            result,
            Err(ControllerError::Camera(CameraError::PermissionDenied(_)))
        ));
        assert_eq!(controller.phase(), UiPhase::Idle);
        assert_eq!(controller.alert(), Some(CAMERA_ALERT));
        assert!(!controller.is_busy());
        assert!(!controller.is_camera_live());
        assert_eq!(camera.live_streams(), 0);

        assert_eq!(controller.take_alert().as_deref(), Some(CAMERA_ALERT));
        assert_eq!(controller.alert(), None);
    }

    #[tokio::test]
    async fn test_retake_clears_photo_and_goes_live() {
        let camera = live_camera();
        let mut controller = controller(camera.clone(), one_face_backend());
        controller.start().await.unwrap();
        controller.capture().await.unwrap();

        let request = controller.begin_retake().unwrap();
        assert!(controller.captured_image().is_none());
        assert!(controller.boxes().is_empty());
        assert_eq!(controller.status(), None);
        controller.finish_start(request.run().await).unwrap();

        assert_eq!(controller.phase(), UiPhase::Live);
        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_second_capture_reuses_loaded_model() {
        let backend = one_face_backend();
        let mut controller = controller(live_camera(), backend.clone());
        controller.start().await.unwrap();
        controller.capture().await.unwrap();
        controller.retake().await.unwrap();

        let _request = controller.begin_capture().unwrap();

        assert_eq!(controller.status(), Some(StatusMessage::Detecting));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_face_is_neutral_message() {
        let mut controller = controller(live_camera(), Arc::new(SlowBackend::new(Vec::new())));
        controller.start().await.unwrap();

        assert_eq!(controller.capture().await, Ok(Completion::Applied));

        assert_eq!(controller.status(), Some(StatusMessage::NoFace));
        assert!(controller.boxes().is_empty());
        assert!(controller.captured_image().is_some());
    }

    #[tokio::test]
    async fn test_detection_failure_keeps_photo() {
        let mut controller = controller(live_camera(), Arc::new(SlowBackend::failing(1)));
        controller.start().await.unwrap();

        assert_eq!(controller.capture().await, Ok(Completion::Applied));

        assert_eq!(controller.phase(), UiPhase::Captured);
        assert!(controller.captured_image().is_some());
        assert_eq!(controller.status(), Some(StatusMessage::DetectionFailed));
    }

    #[tokio::test]
    async fn test_detection_disabled_skips_model() {
        let backend = one_face_backend();
        let mut controller = controller(live_camera(), backend.clone());
        controller.set_detection_enabled(false);
        controller.start().await.unwrap();

        controller.capture().await.unwrap();

        assert_eq!(controller.status(), None);
        assert!(controller.boxes().is_empty());
        assert_eq!(backend.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capture_without_frame_stays_live() {
        let camera = Arc::new(CountingCamera::new(None));
        let mut controller = controller(camera.clone(), one_face_backend());
        controller.start().await.unwrap();

        let result = controller.capture().await;

        assert_eq!(
            result,
            Err(ControllerError::Capture(CaptureError::NoFrame))
        );
        assert_eq!(controller.phase(), UiPhase::Live);
        assert_eq!(controller.status(), Some(StatusMessage::CaptureFailed));
        assert!(!controller.is_busy());
        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_close_during_capture_discards_result() {
        let camera = live_camera();
        let mut controller = controller(camera.clone(), one_face_backend());
        controller.start().await.unwrap();

        let request = controller.begin_capture().unwrap();
        controller.close().unwrap();
        let outcome = request.run().await;

        assert_eq!(controller.finish_capture(outcome), Ok(Completion::Discarded));
        assert_eq!(controller.phase(), UiPhase::Idle);
        assert!(controller.captured_image().is_none());
        assert_eq!(controller.status(), None);
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_close_during_start_releases_late_stream() {
        let camera = live_camera();
        let mut controller = controller(camera.clone(), one_face_backend());

        let request = controller.begin_start().unwrap();
        controller.close().unwrap();
        let outcome = request.run().await;
        assert_eq!(camera.live_streams(), 1);

        assert_eq!(controller.finish_start(outcome), Ok(Completion::Discarded));
        assert_eq!(controller.phase(), UiPhase::Idle);
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_actions_while_pending_are_busy() {
        let mut controller = controller(live_camera(), one_face_backend());

        let _request = controller.begin_start().unwrap();

        assert_eq!(
            controller.begin_start().err(),
            Some(ControllerError::Busy(PendingOperation::Starting))
        );
        assert_eq!(
            controller.begin_capture().err(),
            Some(ControllerError::Busy(PendingOperation::Starting))
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions_are_rejected() {
        let mut controller = controller(live_camera(), one_face_backend());

        assert_eq!(
            controller.begin_capture().err(),
            Some(ControllerError::InvalidTransition {
                action: Action::Capture,
                phase: UiPhase::Idle,
            })
        );
        assert_eq!(
            controller.close(),
            Err(ControllerError::InvalidTransition {
                action: Action::Close,
                phase: UiPhase::Idle,
            })
        );

        controller.start().await.unwrap();
        assert!(matches!(
            controller.begin_retake(),
            Err(ControllerError::InvalidTransition {
                action: Action::Retake,
                ..
            })
        ));
        assert!(matches!(
            controller.begin_start(),
            Err(ControllerError::InvalidTransition {
                action: Action::Start,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_close_then_start_again() {
        let camera = live_camera();
        let mut controller = controller(camera.clone(), one_face_backend());

        controller.start().await.unwrap();
        controller.close().unwrap();
        controller.start().await.unwrap();

        assert_eq!(controller.phase(), UiPhase::Live);
        assert_eq!(camera.live_streams(), 1);
        assert_eq!(camera.opened.load(Ordering::SeqCst), 2);
    }
}
