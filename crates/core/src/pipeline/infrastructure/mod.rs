pub mod analysis_pool;
