pub mod analysis_engine;
pub mod infrastructure;
