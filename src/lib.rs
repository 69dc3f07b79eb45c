//! Self-correcting predictor supervisor
//!
//! Owns a feed-forward network, trains it from labelled text files, verifies every
//! served prediction against ground truth when it is supplied, and retrains on the
//! samples it gets wrong.

pub mod data;
pub mod model;
pub mod predict;
pub mod supervisor;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{Activation, NetworkShape};
use crate::training::rounding::{RoundingPolicy, MAX_PRECISION};

/// A labelled sample: input vector paired with the expected output vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub input: Vec<f64>,
    pub output: Vec<f64>,
}

impl TrainingSample {
    pub fn new(input: Vec<f64>, output: Vec<f64>) -> Self {
        TrainingSample { input, output }
    }
}

/// Ordered collection of samples. Order only matters for hierarchical splits.
pub type TrainingSet = Vec<TrainingSample>;

/// Parameters bound to the predictor for a training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameters {
    pub epochs: usize,
    pub rate: f64,
    pub debug: bool,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        TrainingParameters {
            epochs: 10,
            rate: 1.2,
            debug: false,
        }
    }
}

impl TrainingParameters {
    /// Epochs must be positive and the rate a positive finite number
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(RecommenderError::Config(
                "training epochs must be at least 1".to_string(),
            ));
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(RecommenderError::Config(format!(
                "training rate must be a positive number, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TrainingParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epochs={}, rate={}, debug={}",
            self.epochs, self.rate, self.debug
        )
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("failed to create network: {0}")]
    Construction(String),

    #[error("failed to restore network: {0}")]
    Restore(String),

    #[error("failed to read data at line {line}: {message}")]
    DataLoad { line: usize, message: String },

    #[error("missing input, provide a valid input")]
    MissingInput,

    #[error("failed to parse input: {0}")]
    RequestParse(String),

    #[error("input has {actual} values, network expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("failed to export network: {0}")]
    Export(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecommenderError {
    /// Errors a serving loop reports back to the caller and keeps going after
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RecommenderError::MissingInput
                | RecommenderError::RequestParse(_)
                | RecommenderError::WidthMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RecommenderError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub training: TrainingConfig,
    pub persistence: PersistenceConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input: usize,
    pub hidden: Vec<usize>,
    pub output: usize,
    pub activation: Activation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labelled sample file; training is skipped for restored networks when unset
    pub data_source: Option<String>,
    pub epochs: usize,
    pub rate: f64,
    pub debug: bool,
    /// Use hierarchical training instead of a single batch pass
    pub n_level: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub restore_from: Option<String>,
    pub persist_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub rounding: RoundingPolicy,
    pub precision: i32,
    pub tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        let params = TrainingParameters::default();
        Config {
            network: NetworkConfig {
                input: 2,
                hidden: vec![20, 20],
                output: 2,
                activation: Activation::ReLU,
            },
            training: TrainingConfig {
                data_source: None,
                epochs: params.epochs,
                rate: params.rate,
                debug: params.debug,
                n_level: false,
            },
            persistence: PersistenceConfig {
                restore_from: None,
                persist_to: "networks/output.network".to_string(),
            },
            verification: VerificationConfig {
                rounding: RoundingPolicy::Nearest,
                precision: 3,
                tolerance: training::verification::DEFAULT_TOLERANCE,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecommenderError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RecommenderError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the supervisor cannot run with
    pub fn validate(&self) -> Result<()> {
        self.training_params().validate()?;

        let precision = self.verification.precision;
        if !(-MAX_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(RecommenderError::Config(format!(
                "verification precision must be within ±{}, got {}",
                MAX_PRECISION, precision
            )));
        }
        let tolerance = self.verification.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(RecommenderError::Config(format!(
                "verification tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RecommenderError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Layer shape described by the network section
    pub fn shape(&self) -> NetworkShape {
        NetworkShape::new(
            self.network.input,
            self.network.hidden.clone(),
            self.network.output,
        )
    }

    /// Training parameters described by the training section
    pub fn training_params(&self) -> TrainingParameters {
        TrainingParameters {
            epochs: self.training.epochs,
            rate: self.training.rate,
            debug: self.training.debug,
        }
    }
}
