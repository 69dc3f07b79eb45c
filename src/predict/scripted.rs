//! Deterministic predictor double with scripted outputs

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::model::{Activation, NetworkShape};
use crate::predict::Predictor;
use crate::{RecommenderError, Result, TrainingSample};

/// One recorded call to `train`
#[derive(Debug, Clone, PartialEq)]
pub struct TrainCall {
    pub samples: Vec<TrainingSample>,
    pub epochs: usize,
    pub rate: f64,
    pub debug: bool,
}

#[derive(Serialize, Deserialize)]
struct ScriptedSnapshot {
    shape: NetworkShape,
    responses: Vec<(Vec<f64>, Vec<f64>)>,
}

/// Returns a fixed output per exact input, or a fallback
pub struct ScriptedPredictor {
    shape: NetworkShape,
    responses: Vec<(Vec<f64>, Vec<f64>)>,
    fallback: Vec<f64>,
    /// When set, training memorises each sample so later predictions return its output
    learns: bool,
    fail_export: bool,
    train_calls: Vec<TrainCall>,
}

impl ScriptedPredictor {
    pub fn new(input: usize, output: usize) -> Self {
        ScriptedPredictor {
            shape: NetworkShape::new(input, vec![], output),
            responses: Vec::new(),
            fallback: vec![0.0; output],
            learns: false,
            fail_export: false,
            train_calls: Vec::new(),
        }
    }

    pub fn with_response(mut self, input: Vec<f64>, output: Vec<f64>) -> Self {
        self.set_response(input, output);
        self
    }

    pub fn with_fallback(mut self, output: Vec<f64>) -> Self {
        self.fallback = output;
        self
    }

    pub fn learning(mut self) -> Self {
        self.learns = true;
        self
    }

    pub fn failing_export(mut self) -> Self {
        self.fail_export = true;
        self
    }

    pub fn train_calls(&self) -> &[TrainCall] {
        &self.train_calls
    }

    fn set_response(&mut self, input: Vec<f64>, output: Vec<f64>) {
        match self.responses.iter_mut().find(|(k, _)| *k == input) {
            Some((_, v)) => *v = output,
            None => self.responses.push((input, output)),
        }
    }
}

impl Predictor for ScriptedPredictor {
    fn build(shape: &NetworkShape, _activation: Activation) -> Result<Self> {
        shape.validate()?;
        let mut predictor = ScriptedPredictor::new(shape.input, shape.output);
        predictor.shape = shape.clone();
        Ok(predictor)
    }

    fn restore(source: &mut dyn Read) -> Result<Self> {
        let snapshot: ScriptedSnapshot = serde_json::from_reader(source)
            .map_err(|e| RecommenderError::Restore(e.to_string()))?;
        let mut predictor = ScriptedPredictor::new(snapshot.shape.input, snapshot.shape.output);
        predictor.shape = snapshot.shape;
        predictor.responses = snapshot.responses;
        Ok(predictor)
    }

    fn shape(&self) -> &NetworkShape {
        &self.shape
    }

    fn predict(&self, input: &[f64]) -> Vec<f64> {
        self.responses
            .iter()
            .find(|(k, _)| k.as_slice() == input)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn train(&mut self, samples: &[TrainingSample], epochs: usize, rate: f64, debug: bool) {
        self.train_calls.push(TrainCall {
            samples: samples.to_vec(),
            epochs,
            rate,
            debug,
        });
        if self.learns {
            for sample in samples {
                self.set_response(sample.input.clone(), sample.output.clone());
            }
        }
    }

    fn export(&self, sink: &mut dyn Write) -> Result<()> {
        if self.fail_export {
            return Err(RecommenderError::Export("scripted export failure".to_string()));
        }
        let snapshot = ScriptedSnapshot {
            shape: self.shape.clone(),
            responses: self.responses.clone(),
        };
        serde_json::to_writer(sink, &snapshot).map_err(|e| RecommenderError::Export(e.to_string()))
    }
}
