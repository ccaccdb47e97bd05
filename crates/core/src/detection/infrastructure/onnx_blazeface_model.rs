//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! Bounding boxes only; keypoints in the regressor output are ignored.
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::detection::domain::errors::ModelLoadError;
use crate::detection::domain::face_detector::{
    BackendError, DetectionModel, DetectionOptions, ModelBackend, ModelBox, ModelDetection,
};
use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::shared::config::DetectionConfig;
use crate::shared::frame::Frame;
use crate::shared::model_resolver;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

/// Resolves the BlazeFace asset and builds an ONNX Runtime session for it.
pub struct BlazefaceBackend {
    config: DetectionConfig,
}

impl BlazefaceBackend {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }
}

impl ModelBackend for BlazefaceBackend {
    fn load_model(&self) -> Result<Arc<dyn DetectionModel>, ModelLoadError> {
        let progress: model_resolver::ProgressFn = Box::new(|downloaded, total| {
            log::debug!("Downloading face model: {downloaded}/{total} bytes");
        });
        let path = model_resolver::resolve(
            &self.config.model_dir,
            &self.config.model_name,
            self.config.model_url.as_deref(),
            Some(progress),
        )
        .map_err(|e| ModelLoadError::Resolve(e.to_string()))?;

        log::info!("Loading face model from {}", path.display());
        let model = BlazefaceModel::from_file(&path)?;
        Ok(Arc::new(model))
    }
}

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct BlazefaceModel {
    session: Mutex<ort::session::Session>,
    anchors: Vec<[f32; 2]>,
}

impl BlazefaceModel {
    pub fn from_file(model_path: &Path) -> Result<Self, ModelLoadError> {
        let session = build_session(model_path)
            .map_err(|e| ModelLoadError::Initialize(format!("{}: {e}", model_path.display())))?;
        Ok(Self {
            session: Mutex::new(session),
            anchors: generate_anchors(),
        })
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, String> {
    ort::session::Session::builder()
        .map_err(|e| e.to_string())?
        .with_execution_providers(preferred_execution_providers())
        .map_err(|e| e.to_string())?
        .commit_from_file(model_path)
        .map_err(|e| e.to_string())
}

impl DetectionModel for BlazefaceModel {
    fn detect_all(
        &self,
        frame: &Frame,
        options: &DetectionOptions,
    ) -> Result<Vec<ModelDetection>, BackendError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        if frame.channels() == 0 {
            return Err("frame has no color channels".into());
        }
        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(|e| e.to_string())?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| e.to_string())?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| e.to_string())?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(|e| e.to_string())?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut candidates = decode(
            &self.anchors,
            reg_data,
            score_data,
            options.min_confidence,
            frame.width(),
            frame.height(),
        );
        let mut kept = nms(&mut candidates, NMS_IOU_THRESH);
        kept.truncate(options.max_results);
        Ok(kept)
    }
}

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
/// Gray frames (1 or 2 channels) feed their luma into all three planes.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let gray = frame.channels() < 3;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                let src_c = if gray { 0 } else { c };
                tensor[[0, c, y, x]] = src[[src_y, src_x, src_c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Anchor centres for the short-range model: a 16×16 grid with 2 anchors
/// per cell followed by an 8×8 grid with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)];
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

/// Turns raw outputs into image-space boxes above `min_confidence`,
/// clamped to the frame.
fn decode(
    anchors: &[[f32; 2]],
    reg_data: &[f32],
    score_data: &[f32],
    min_confidence: f32,
    frame_width: u32,
    frame_height: u32,
) -> Vec<ModelDetection> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let scale = INPUT_SIZE as f32;
    let mut detections = Vec::new();

    for (i, (&raw_score, anchor)) in score_data.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score);
        if score < min_confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = reg_data.get(offset..offset + 4) else {
            break;
        };

        let cx = anchor[0] + reg[0] / scale;
        let cy = anchor[1] + reg[1] / scale;
        let w = reg[2] / scale;
        let h = reg[3] / scale;

        let x1 = ((cx - w / 2.0) * fw).clamp(0.0, fw);
        let y1 = ((cy - h / 2.0) * fh).clamp(0.0, fh);
        let x2 = ((cx + w / 2.0) * fw).clamp(0.0, fw);
        let y2 = ((cy + h / 2.0) * fh).clamp(0.0, fh);

        detections.push(ModelDetection {
            detection_box: ModelBox {
                left: x1,
                top: y1,
                width: x2 - x1,
                height: y2 - y1,
            },
            score,
        });
    }
    detections
}

fn nms(dets: &mut [ModelDetection], iou_thresh: f32) -> Vec<ModelDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];
    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && box_iou(&dets[i].detection_box, &dets[j].detection_box) > iou_thresh
            {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn box_iou(a: &ModelBox, b: &ModelBox) -> f32 {
    let x1 = a.left.max(b.left);
    let y1 = a.top.max(b.top);
    let x2 = (a.left + a.width).min(b.left + b.width);
    let y2 = (a.top + a.height).min(b.top + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.width * a.height + b.width * b.height - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
