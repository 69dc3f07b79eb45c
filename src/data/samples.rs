//! Labelled sample files
//!
//! One sample per line: `<input> <output>`, each a comma-separated list of reals,
//! e.g. `0.9,0.1 1,0`. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::model::NetworkShape;
use crate::{RecommenderError, Result, TrainingSample, TrainingSet};

/// Parse a comma-separated list of reals
pub fn parse_vector(field: &str) -> std::result::Result<Vec<f64>, String> {
    field
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .map_err(|e| format!("invalid number {:?}: {}", token, e))
        })
        .collect()
}

/// Parse one line of a sample file; `line` is 1-based and only used for errors
pub fn parse_sample_line(text: &str, line: usize) -> Result<TrainingSample> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let data_err = |message: String| RecommenderError::DataLoad { line, message };

    match fields.as_slice() {
        [input, output] => {
            let input = parse_vector(input).map_err(|e| data_err(format!("input: {}", e)))?;
            let output = parse_vector(output).map_err(|e| data_err(format!("output: {}", e)))?;
            Ok(TrainingSample::new(input, output))
        }
        [_] => Err(data_err("missing output field".to_string())),
        _ => Err(data_err(format!("expected 2 fields, found {}", fields.len()))),
    }
}

/// Read every sample from a reader, failing on the first malformed line
pub fn read_training_set<R: BufRead>(reader: R) -> Result<TrainingSet> {
    let mut samples = TrainingSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        samples.push(parse_sample_line(&line, idx + 1)?);
    }
    Ok(samples)
}

/// Load a sample file from disk
pub fn load_training_set(path: &str) -> Result<TrainingSet> {
    let file = File::open(path).map_err(|e| {
        RecommenderError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open training data {}: {}", path, e),
        ))
    })?;
    let samples = read_training_set(BufReader::new(file))?;
    log::info!("Loaded {} samples from {}", samples.len(), path);
    Ok(samples)
}

/// Make sure every sample fits the network's input and output widths.
///
/// Errors report the sample's position as a 1-based line number.
pub fn check_widths(samples: &[TrainingSample], shape: &NetworkShape) -> Result<()> {
    for (idx, sample) in samples.iter().enumerate() {
        if sample.input.len() != shape.input || sample.output.len() != shape.output {
            return Err(RecommenderError::DataLoad {
                line: idx + 1,
                message: format!(
                    "sample has {} inputs and {} outputs, network {} expects {} and {}",
                    sample.input.len(),
                    sample.output.len(),
                    shape,
                    shape.input,
                    shape.output
                ),
            });
        }
    }
    Ok(())
}
