use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::overlay_renderer::OverlayStyle;
use crate::shared::constants::{
    BLAZEFACE_MODEL_NAME, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_RATE, DEFAULT_FRAME_WIDTH,
    DEFAULT_MAX_RESULTS, DEFAULT_MIN_CONFIDENCE, MODEL_DIR,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("frame size must be non-zero, got {width}x{height}")]
    FrameSize { width: u32, height: u32 },
    #[error("frame rate must be between 1 and 120, got {0}")]
    FrameRate(u32),
    #[error("confidence must be between 0.0 and 1.0, got {0}")]
    Confidence(f32),
    #[error("max results must be at least 1")]
    MaxResults,
    #[error("overlay line width must be between 1 and 32, got {0}")]
    LineWidth(u32),
}

/// Camera device selection and requested stream format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Platform device name; `None` picks the platform default.
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

/// Where the detection model lives and how detections are filtered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub enabled: bool,
    pub min_confidence: f32,
    pub max_results: usize,
    pub model_dir: PathBuf,
    pub model_name: String,
    /// Optional download source used when the model is not found locally.
    pub model_url: Option<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_results: DEFAULT_MAX_RESULTS,
            model_dir: PathBuf::from(MODEL_DIR),
            model_name: BLAZEFACE_MODEL_NAME.to_string(),
            model_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacecamConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub overlay: OverlayStyle,
}

impl FacecamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if camera.width == 0 || camera.height == 0 {
            return Err(ConfigError::FrameSize {
                width: camera.width,
                height: camera.height,
            });
        }
        if !(1..=120).contains(&camera.frame_rate) {
            return Err(ConfigError::FrameRate(camera.frame_rate));
        }
        let detection = &self.detection;
        if !(0.0..=1.0).contains(&detection.min_confidence) {
            return Err(ConfigError::Confidence(detection.min_confidence));
        }
        if detection.max_results == 0 {
            return Err(ConfigError::MaxResults);
        }
        if !(1..=32).contains(&self.overlay.line_width) {
            return Err(ConfigError::LineWidth(self.overlay.line_width));
        }
        Ok(())
    }
}
