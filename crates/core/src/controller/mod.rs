pub mod phase;
pub mod status_message;
pub mod view_controller;
