pub mod backend_factory;
pub mod cascade_backend;
pub mod frontal_face_cascade;
pub mod landmark_backend;
pub mod math;
pub mod onnx_landmark_provider;
