pub mod detector_environment;
pub mod errors;
pub mod face_detector;
pub mod model_state;
