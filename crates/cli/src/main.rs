use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;

use facecam_core::camera::domain::camera_device::CameraDevice;
use facecam_core::camera::domain::video_surface::VideoSurface;
use facecam_core::camera::infrastructure::ffmpeg_camera::FfmpegCamera;
use facecam_core::camera::infrastructure::still_image_camera::StillImageCamera;
use facecam_core::controller::view_controller::ViewController;
use facecam_core::shared::bounding_box::BoundingBox;
use facecam_core::shared::config::{CameraConfig, DetectionConfig, FacecamConfig};
use facecam_core::shared::constants::{
    BLAZEFACE_MODEL_NAME, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_RATE, DEFAULT_FRAME_WIDTH,
    DEFAULT_MAX_RESULTS, DEFAULT_MIN_CONFIDENCE, MODEL_DIR,
};

/// Poll interval while waiting for the camera's first frame.
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Capture one photo from a camera and mark the faces in it.
#[derive(Parser, Debug)]
#[command(name = "facecam")]
struct Cli {
    /// Output PNG file.
    output: PathBuf,

    /// Camera device (e.g. /dev/video0 on Linux, 0 on macOS).
    #[arg(long, conflicts_with = "source")]
    device: Option<String>,

    /// Use a still image instead of a camera.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Requested frame width.
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    width: u32,

    /// Requested frame height.
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    height: u32,

    /// Requested frame rate.
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    fps: u32,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    confidence: f32,

    /// Maximum number of faces to mark.
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_faces: usize,

    /// Directory holding the face detection model.
    #[arg(long, default_value = MODEL_DIR)]
    model_dir: PathBuf,

    /// Download the model from this URL when it is not found locally.
    #[arg(long)]
    model_url: Option<String>,

    /// Skip face detection and save the plain photo.
    #[arg(long)]
    no_detect: bool,

    /// Milliseconds to wait for the camera's first frame.
    #[arg(long, default_value_t = 3000)]
    warmup_ms: u64,

    /// Print a JSON report instead of the status line.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    status: Option<String>,
    faces: Vec<BoundingBox>,
    width: u32,
    height: u32,
    output: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&cli);
    config.validate()?;

    let device = open_device(&cli, &config.camera);
    log::info!("Capturing from {}", device.describe());
    let mut controller = ViewController::from_config(device, &config);

    if let Err(e) = controller.start().await {
        if let Some(alert) = controller.take_alert() {
            eprintln!("{alert}");
        }
        return Err(e.into());
    }

    wait_for_frame(&controller.surface(), Duration::from_millis(cli.warmup_ms)).await;
    controller.capture().await?;

    let image = controller
        .captured_image()
        .ok_or("capture finished without an image")?;
    image.save(&cli.output)?;

    let report = Report {
        status: controller.status().map(|s| s.to_string()),
        faces: controller.boxes().to_vec(),
        width: image.width(),
        height: image.height(),
        output: cli.output.clone(),
    };
    print_report(&report, cli.json)?;
    Ok(())
}

fn build_config(cli: &Cli) -> FacecamConfig {
    FacecamConfig {
        camera: CameraConfig {
            device: cli.device.clone(),
            width: cli.width,
            height: cli.height,
            frame_rate: cli.fps,
        },
        detection: DetectionConfig {
            enabled: !cli.no_detect,
            min_confidence: cli.confidence,
            max_results: cli.max_faces,
            model_dir: cli.model_dir.clone(),
            model_name: BLAZEFACE_MODEL_NAME.to_string(),
            model_url: cli.model_url.clone(),
        },
        ..FacecamConfig::default()
    }
}

fn open_device(cli: &Cli, camera: &CameraConfig) -> Arc<dyn CameraDevice> {
    match &cli.source {
        Some(path) => Arc::new(StillImageCamera::from_path(path)),
        None => Arc::new(FfmpegCamera::new(camera.clone())),
    }
}

/// Real cameras may need a moment after opening before the first frame
/// lands. Capture reports `NoFrame` if none arrives in time.
async fn wait_for_frame(surface: &VideoSurface, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while surface.current_frame().is_none() && Instant::now() < deadline {
        tokio::time::sleep(FRAME_POLL_INTERVAL).await;
    }
}

fn print_report(report: &Report, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "Saved {}x{} photo to {}",
        report.width,
        report.height,
        report.output.display()
    );
    if let Some(status) = &report.status {
        println!("{status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_onto_config() {
        let cli = Cli::try_parse_from(["facecam", "out.png"]).unwrap();
        let config = build_config(&cli);

        assert_eq!(config.camera, CameraConfig::default());
        assert_eq!(config.detection, DetectionConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_detect_disables_detection() {
        let cli = Cli::try_parse_from(["facecam", "--no-detect", "out.png"]).unwrap();
        assert!(!build_config(&cli).detection.enabled);
    }

    #[test]
    fn test_out_of_range_confidence_fails_validation() {
        let cli = Cli::try_parse_from(["facecam", "--confidence", "1.5", "out.png"]).unwrap();
        assert!(build_config(&cli).validate().is_err());
    }

    #[test]
    fn test_device_and_source_conflict() {
        let result =
            Cli::try_parse_from(["facecam", "--device", "0", "--source", "a.png", "out.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_report_json_shape() {
        let report = Report {
            status: Some("1 face detected.".into()),
            faces: vec![BoundingBox::new(10.0, 20.0, 100.0, 120.0)],
            width: 640,
            height: 480,
            output: PathBuf::from("out.png"),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "1 face detected.");
        assert_eq!(value["faces"][0]["width"], 100.0);
    }
}
