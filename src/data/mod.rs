//! Data ingestion
//!
//! Labelled sample files, interactive request lines, and synthetic dataset generation.

pub mod generate;
pub mod request;
pub mod samples;

pub use request::{parse_predict_request, PredictRequest};
pub use samples::{load_training_set, read_training_set};
