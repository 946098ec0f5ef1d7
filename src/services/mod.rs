pub mod location_api;
pub mod sample_source;
