use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::camera::domain::camera_device::{CameraDevice, CameraError, StreamHandle};
use crate::camera::domain::video_surface::FrameFeed;
use crate::shared::config::CameraConfig;
use crate::shared::frame::Frame;

/// How long the device gets to start streaming before the request fails.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `release` waits for the capture thread before detaching it.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

/// Back-off between reads while the device reports EAGAIN.
const RETRY_INTERVAL: Duration = Duration::from_millis(5);

#[cfg(target_os = "linux")]
const PLATFORM_INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const PLATFORM_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const PLATFORM_INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const PLATFORM_INPUT_FORMAT: &str = "v4l2";

type Ready = Result<(u32, u32), CameraError>;

/// Webcam access through libavdevice (ffmpeg-next).
///
/// Each stream owns a capture thread that opens the device, decodes frames
/// to RGB24 and publishes them into the stream's [`FrameFeed`]. The ffmpeg
/// contexts never leave that thread.
pub struct FfmpegCamera {
    config: CameraConfig,
}

impl FfmpegCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    fn device_name(&self) -> Option<String> {
        self.config.device.clone().or_else(default_device)
    }
}

impl CameraDevice for FfmpegCamera {
    fn request_stream(&self) -> Result<Arc<dyn StreamHandle>, CameraError> {
        let device = self
            .device_name()
            .ok_or_else(|| CameraError::Unavailable("no camera device configured".into()))?;

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Ready>(1);
        let stream = {
            let config = self.config.clone();
            let device = device.clone();
            FfmpegStream::spawn(RELEASE_TIMEOUT, move |feed, stop| {
                capture_loop(&config, &device, feed, stop, &ready_tx)
            })
            .map_err(|e| CameraError::Unavailable(format!("cannot spawn capture thread: {e}")))?
        };

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok((width, height))) => {
                log::info!("Camera {device} streaming at {width}x{height}");
                Ok(Arc::new(stream))
            }
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Unavailable(format!(
                "{device} did not start streaming within {}s",
                OPEN_TIMEOUT.as_secs()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::Unavailable(format!(
                "capture thread for {device} exited before streaming"
            ))),
        }
    }

    fn describe(&self) -> String {
        format!(
            "{PLATFORM_INPUT_FORMAT} device {}",
            self.device_name().unwrap_or_else(|| "<none>".into())
        )
    }
}

fn default_device() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        Some("/dev/video0".into())
    }
    #[cfg(target_os = "macos")]
    {
        Some("0".into())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

fn capture_loop(
    config: &CameraConfig,
    device: &str,
    feed: &FrameFeed,
    stop: &AtomicBool,
    ready: &Sender<Ready>,
) {
    let mut session = match DeviceSession::open(config, device) {
        Ok(session) => session,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok((session.width, session.height))).is_err() {
        return;
    }

    let mut sequence = 0u64;
    loop {
        match session.next_frame(sequence, stop) {
            Ok(Pull::Frame(frame)) => {
                feed.publish(frame);
                sequence += 1;
            }
            Ok(Pull::Stopped) => break,
            Ok(Pull::EndOfStream) => {
                log::warn!("Camera {device} stopped delivering frames");
                break;
            }
            Err(ReadError::Decode(e)) => log::debug!("Skipping undecodable camera packet: {e}"),
            Err(ReadError::Device(e)) => {
                log::warn!("Camera {device} read failed: {e}");
                break;
            }
        }
    }
    stop.store(true, Ordering::Release);
    log::debug!("Capture thread for {device} finished after {sequence} frames");
}

enum Pull {
    Frame(Frame),
    Stopped,
    EndOfStream,
}

enum ReadError {
    /// The device itself failed (unplugged, I/O error). Fatal for the stream.
    Device(ffmpeg_next::Error),
    /// One packet or frame could not be decoded or converted.
    Decode(ffmpeg_next::Error),
}

/// Open device plus the decoder and RGB scaler for its video stream.
struct DeviceSession {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

impl DeviceSession {
    fn open(config: &CameraConfig, device: &str) -> Result<Self, CameraError> {
        ffmpeg_next::init()
            .map_err(|e| CameraError::Unavailable(format!("ffmpeg init failed: {e}")))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| matches_format_name(f.name(), PLATFORM_INPUT_FORMAT))
            .ok_or_else(|| {
                CameraError::Unavailable(format!(
                    "capture format {PLATFORM_INPUT_FORMAT} is not available"
                ))
            })?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", config.width, config.height));
        options.set("framerate", &config.frame_rate.to_string());

        let context = ffmpeg_next::format::open_with(
            device,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )
        .map_err(|e| open_error(device, e))?;
        let ffmpeg_next::format::context::Context::Input(input) = context else {
            return Err(CameraError::Unavailable(format!(
                "{device} did not open as an input"
            )));
        };

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraError::Unavailable(format!("{device} has no video stream")))?;
        let stream_index = stream.index();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CameraError::Unavailable(format!("{device}: no decoder: {e}")))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CameraError::Unavailable(format!("{device}: no RGB converter: {e}")))?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        })
    }

    /// Reads packets until a frame decodes, `stop` is raised or the device
    /// ends. `stop` is checked before every packet read; a read that blocks
    /// inside the driver is bounded by [`FfmpegStream::release`] instead.
    fn next_frame(&mut self, sequence: u64, stop: &AtomicBool) -> Result<Pull, ReadError> {
        loop {
            if stop.load(Ordering::Acquire) {
                return Ok(Pull::Stopped);
            }

            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
                self.scaler.run(&decoded, &mut rgb).map_err(ReadError::Decode)?;
                let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
                return Ok(Pull::Frame(Frame::new(
                    pixels,
                    self.width,
                    self.height,
                    3,
                    sequence,
                )));
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => return Ok(Pull::EndOfStream),
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    thread::sleep(RETRY_INTERVAL);
                    continue;
                }
                Err(e) => return Err(ReadError::Device(e)),
            }
            if packet.stream() != self.stream_index {
                continue;
            }
            self.decoder.send_packet(&packet).map_err(ReadError::Decode)?;
        }
    }
}

/// libavdevice names can carry aliases, e.g. `"video4linux2,v4l2"`.
fn matches_format_name(name: &str, wanted: &str) -> bool {
    name.split(',').any(|n| n == wanted)
}

fn open_error(device: &str, err: ffmpeg_next::Error) -> CameraError {
    if let ffmpeg_next::Error::Other { errno } = &err {
        let kind = std::io::Error::from_raw_os_error(*errno).kind();
        if kind == std::io::ErrorKind::PermissionDenied {
            return CameraError::PermissionDenied(format!("{device}: {err}"));
        }
    }
    CameraError::Unavailable(format!("{device}: {err}"))
}

/// Copies an RGB24 frame row by row, dropping stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

/// One capture thread and the feed it publishes into.
///
/// The thread holds `done_tx` for its whole life, so `done_rx` disconnects
/// when it returns (or unwinds). `release` waits on that with a bound and
/// detaches a thread stuck in a driver call rather than blocking the caller.
struct FfmpegStream {
    feed: Arc<FrameFeed>,
    stop: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
    release_timeout: Duration,
}

struct Worker {
    handle: JoinHandle<()>,
    done_rx: Receiver<()>,
}

impl FfmpegStream {
    fn spawn<F>(release_timeout: Duration, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(&FrameFeed, &AtomicBool) + Send + 'static,
    {
        let feed = Arc::new(FrameFeed::new());
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = {
            let feed = feed.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("camera-capture".into())
                .spawn(move || {
                    let _done = done_tx;
                    body(&feed, &stop);
                })?
        };

        Ok(Self {
            feed,
            stop,
            worker: Mutex::new(Some(Worker { handle, done_rx })),
            release_timeout,
        })
    }
}

impl StreamHandle for FfmpegStream {
    fn feed(&self) -> Arc<FrameFeed> {
        self.feed.clone()
    }

    fn release(&self) {
        self.stop.store(true, Ordering::Release);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };

        match worker.done_rx.recv_timeout(self.release_timeout) {
            Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    log::error!("Camera capture thread panicked");
                } else {
                    log::debug!("Camera capture thread joined");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Camera capture thread did not stop within {}ms; detaching it",
                    self.release_timeout.as_millis()
                );
            }
        }
    }

    fn is_active(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Instant;

    #[rstest]
    #[case("video4linux2,v4l2", "v4l2", true)]
    #[case("avfoundation", "avfoundation", true)]
    #[case("dshow", "v4l2", false)]
    #[case("v4l2loopback", "v4l2", false)]
    fn test_matches_format_aliases(#[case] name: &str, #[case] wanted: &str, #[case] hit: bool) {
        assert_eq!(matches_format_name(name, wanted), hit);
    }

    #[cfg(unix)]
    #[test]
    fn test_eacces_maps_to_permission_denied() {
        let err = open_error("/dev/video0", ffmpeg_next::Error::Other { errno: 13 });
        assert!(matches!(err, CameraError::PermissionDenied(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_device_maps_to_unavailable() {
        let err = open_error("/dev/video9", ffmpeg_next::Error::Other { errno: 2 });
        assert!(matches!(err, CameraError::Unavailable(_)));
    }

    #[test]
    fn test_describe_names_device() {
        let camera = FfmpegCamera::new(CameraConfig {
            device: Some("cam-under-test".into()),
            ..CameraConfig::default()
        });
        assert!(camera.describe().contains("cam-under-test"));
    }

    #[test]
    fn test_release_joins_cooperative_thread() {
        let stream = FfmpegStream::spawn(Duration::from_secs(5), |feed, stop| {
            while !stop.load(Ordering::Acquire) {
                feed.publish(Frame::solid(2, 2, [1, 2, 3]));
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        assert!(stream.is_active());

        stream.release();

        assert!(!stream.is_active());
        assert!(stream.worker.lock().unwrap().is_none());
    }

    #[test]
    fn test_release_returns_while_capture_thread_is_stalled() {
        // Stands in for a driver read that never returns.
        let (unblock_tx, unblock_rx) = crossbeam_channel::bounded::<()>(0);
        let stream = FfmpegStream::spawn(Duration::from_millis(50), move |_feed, _stop| {
            let _ = unblock_rx.recv();
        })
        .unwrap();

        let started = Instant::now();
        stream.release();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!stream.is_active());
        // a second release is a no-op
        stream.release();
        drop(unblock_tx);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_nonexistent_device_fails_without_stream() {
        let camera = FfmpegCamera::new(CameraConfig {
            device: Some("/dev/facecam-does-not-exist".into()),
            ..CameraConfig::default()
        });
        assert!(matches!(
            camera.request_stream(),
            Err(CameraError::Unavailable(_))
        ));
    }
}
