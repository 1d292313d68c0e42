pub mod constants;
pub mod frame;
pub mod frame_decoder;
pub mod grayscale;
pub mod model_resolver;
