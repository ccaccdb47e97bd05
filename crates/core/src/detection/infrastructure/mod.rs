pub mod detector_factory;
pub mod execution_provider;
pub mod lazy_model;
pub mod onnx_blazeface_model;
