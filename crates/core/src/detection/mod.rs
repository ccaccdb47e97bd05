pub mod domain;
pub mod face_detector_facade;
pub mod infrastructure;
