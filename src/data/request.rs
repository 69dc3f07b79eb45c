//! Interactive prediction requests
//!
//! `<input>` asks for a prediction; `<input> <expected>` also verifies it.

use crate::data::samples::parse_vector;
use crate::{RecommenderError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub input: Vec<f64>,
    /// Ground truth to verify against, if supplied
    pub expected: Option<Vec<f64>>,
}

impl std::str::FromStr for PredictRequest {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self> {
        parse_predict_request(s)
    }
}

pub fn parse_predict_request(line: &str) -> Result<PredictRequest> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [] => Err(RecommenderError::MissingInput),
        [input] => Ok(PredictRequest {
            input: parse_field(input)?,
            expected: None,
        }),
        [input, expected] => Ok(PredictRequest {
            input: parse_field(input)?,
            expected: Some(parse_field(expected)?),
        }),
        _ => Err(RecommenderError::RequestParse(format!(
            "expected at most 2 fields, found {}",
            fields.len()
        ))),
    }
}

fn parse_field(field: &str) -> Result<Vec<f64>> {
    parse_vector(field).map_err(RecommenderError::RequestParse)
}
