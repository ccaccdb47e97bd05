use thiserror::Error;

/// Why the detection model could not be made ready.
///
/// `Clone` so one failed load can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadError {
    #[error("model asset unavailable: {0}")]
    Resolve(String),
    #[error("model failed to initialize: {0}")]
    Initialize(String),
    #[error("model load task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error("native face detector failed: {0}")]
    Native(String),
    #[error("face detection failed: {0}")]
    Inference(String),
    #[error("detection task failed: {0}")]
    Task(String),
}
