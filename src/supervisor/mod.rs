//! Lifecycle supervisor
//!
//! Owns the single resident predictor and the correction worker attached to it. A
//! `Supervisor` only exists once a predictor has been built or restored, and
//! [`Supervisor::shutdown`] consumes it, so there is no way back to an
//! uninitialised state and nothing can be served after the final export.

pub mod persist;
pub mod serve;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::data::samples::{check_widths, load_training_set};
use crate::data::{parse_predict_request, PredictRequest};
use crate::model::{Activation, NetworkShape};
use crate::predict::{Predictor, SharedPredictor};
use crate::training::hierarchical::{train_hierarchical, HierarchyReport};
use crate::training::rounding::RoundingPolicy;
use crate::training::verification::{verify_and_maybe_retrain, VerificationOutcome, VerifyOptions};
use crate::training::CorrectionWorker;
use crate::{RecommenderError, Result, TrainingParameters, TrainingSample};

/// Answer to one interactive request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Prediction(Vec<f64>),
    Verified(VerificationOutcome),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Prediction(values) => write!(f, "Predicted value: {:?}", values),
            Response::Verified(outcome) => write!(
                f,
                "Predicted value: {:?}, matches: {}",
                outcome.predicted, outcome.verified
            ),
        }
    }
}

/// Summary of an orderly shutdown
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub corrections_applied: usize,
    pub snapshot: PathBuf,
    /// Where the previous snapshot was moved, if there was one
    pub rotated: Option<PathBuf>,
}

pub struct Supervisor<P: Predictor> {
    predictor: SharedPredictor<P>,
    corrections: CorrectionWorker,
    verify_options: VerifyOptions,
}

impl<P: Predictor> Supervisor<P> {
    /// Build an untrained predictor
    pub fn construct(
        shape: &NetworkShape,
        activation: Activation,
        params: TrainingParameters,
    ) -> Result<Self> {
        let predictor = P::build(shape, activation).map_err(|e| match e {
            RecommenderError::Construction(_) => e,
            other => RecommenderError::Construction(other.to_string()),
        })?;
        log::info!("Created network {} ({})", shape, activation);
        Self::from_predictor(predictor, params)
    }

    /// Rebuild a predictor from a snapshot stream
    pub fn restore(source: &mut dyn Read, params: TrainingParameters) -> Result<Self> {
        let predictor = P::restore(source).map_err(|e| match e {
            RecommenderError::Restore(_) => e,
            other => RecommenderError::Restore(other.to_string()),
        })?;
        Self::from_predictor(predictor, params)
    }

    /// Rebuild a predictor from a snapshot file
    pub fn restore_from_path(path: &str, params: TrainingParameters) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            RecommenderError::Restore(format!("failed to open source network {}: {}", path, e))
        })?;
        Self::restore(&mut BufReader::new(file), params)
    }

    fn from_predictor(predictor: P, params: TrainingParameters) -> Result<Self> {
        params.validate()?;
        let predictor = SharedPredictor::new(predictor, params);
        let corrections = CorrectionWorker::spawn(predictor.clone())?;

        Ok(Supervisor {
            predictor,
            corrections,
            verify_options: VerifyOptions::new(RoundingPolicy::Nearest, 3),
        })
    }

    /// How interactive requests with an expected output are verified
    pub fn with_verify_options(mut self, options: VerifyOptions) -> Self {
        self.verify_options = options;
        self
    }

    pub fn shape(&self) -> NetworkShape {
        self.predictor.shape()
    }

    pub fn params(&self) -> TrainingParameters {
        self.predictor.params()
    }

    pub fn pending_corrections(&self) -> usize {
        self.corrections.pending()
    }

    /// Load a sample file, train on it in one batch, and bind `params`
    pub fn train_from(&self, source: &str, params: TrainingParameters) -> Result<()> {
        let samples = load_training_set(source)?;
        self.train_on(&samples, params)
    }

    pub fn train_on(&self, samples: &[TrainingSample], params: TrainingParameters) -> Result<()> {
        params.validate()?;
        check_widths(samples, &self.shape())?;
        log::info!("Training on {} samples ({})", samples.len(), params);
        self.predictor.train(samples, &params);
        self.predictor.bind(params);
        Ok(())
    }

    /// Load a sample file and train on it hierarchically
    pub fn train_hierarchical_from(
        &self,
        source: &str,
        params: TrainingParameters,
    ) -> Result<HierarchyReport> {
        params.validate()?;
        let samples = load_training_set(source)?;
        check_widths(&samples, &self.shape())?;
        Ok(train_hierarchical(
            &self.predictor,
            &self.corrections,
            samples,
            params,
        ))
    }

    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_input(input)?;
        Ok(self.predictor.predict(input))
    }

    /// Predict and verify against `expected`, queueing a correction on mismatch
    pub fn verify(&self, input: &[f64], expected: Vec<f64>) -> Result<VerificationOutcome> {
        self.check_input(input)?;
        Ok(verify_and_maybe_retrain(
            &self.predictor,
            &self.corrections,
            input,
            expected,
            &self.verify_options,
        ))
    }

    /// Serve one interactive request line
    pub fn handle_request(&self, line: &str) -> Result<Response> {
        let PredictRequest { input, expected } = parse_predict_request(line)?;
        match expected {
            Some(expected) => self.verify(&input, expected).map(Response::Verified),
            None => self.predict(&input).map(Response::Prediction),
        }
    }

    pub fn export(&self, sink: &mut dyn Write) -> Result<()> {
        self.predictor.export(sink).map_err(|e| match e {
            RecommenderError::Export(_) => e,
            other => RecommenderError::Export(other.to_string()),
        })
    }

    /// Wait for queued corrections, then persist the final state to `persist_to`
    pub fn shutdown(self, persist_to: &str) -> Result<ShutdownReport> {
        let Supervisor {
            predictor,
            corrections,
            ..
        } = self;

        let corrections_applied = corrections.drain();
        log::info!("Applied {} corrections this session", corrections_applied);

        let snapshot = PathBuf::from(persist_to);
        let rotated = persist::write_snapshot(&predictor, Path::new(persist_to))?;

        Ok(ShutdownReport {
            corrections_applied,
            snapshot,
            rotated,
        })
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        let expected = self.shape().input;
        if input.len() != expected {
            return Err(RecommenderError::WidthMismatch {
                expected,
                actual: input.len(),
            });
        }
        Ok(())
    }
}
