pub mod camera;
pub mod capture;
pub mod controller;
pub mod detection;
pub mod overlay;
pub mod shared;
