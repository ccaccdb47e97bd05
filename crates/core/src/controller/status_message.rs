use std::fmt;

/// Status line shown under the preview or the captured photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    LoadingModel,
    Detecting,
    FacesDetected(usize),
    NoFace,
    DetectionFailed,
    CaptureFailed,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::LoadingModel => f.write_str("Loading face detection model..."),
            StatusMessage::Detecting => f.write_str("Detecting faces..."),
            StatusMessage::FacesDetected(1) => f.write_str("1 face detected."),
            StatusMessage::FacesDetected(n) => write!(f, "{n} faces detected."),
            StatusMessage::NoFace => f.write_str("No face detected."),
            StatusMessage::DetectionFailed => {
                f.write_str("Face detection failed. The photo was kept without overlays.")
            }
            StatusMessage::CaptureFailed => f.write_str("Could not capture a photo. Try again."),
        }
    }
}
