/// Fixed relative location of the bundled model assets.
pub const MODEL_DIR: &str = "models";
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";

/// Application folder name under the platform cache directory.
pub const APP_DIR_NAME: &str = "Facecam";

pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_FRAME_RATE: u32 = 30;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_MAX_RESULTS: usize = 10;

pub const OVERLAY_COLOR: [u8; 3] = [255, 0, 0];
pub const OVERLAY_LINE_WIDTH: u32 = 3;

/// Shown when the camera cannot be opened.
pub const CAMERA_ALERT: &str =
    "Could not access the camera. Check the camera permission settings for this application.";
