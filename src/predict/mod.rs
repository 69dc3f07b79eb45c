//! Prediction engine seam
//!
//! The supervisor only talks to a [`Predictor`]; the burn-backed [`NetworkPredictor`]
//! is the production implementation.

pub mod network;
pub mod shared;

#[cfg(test)]
pub mod scripted;

use std::io::{Read, Write};

use crate::model::{Activation, NetworkShape};
use crate::{Result, TrainingSample};

pub use network::{DefaultPredictor, NetworkPredictor};
pub use shared::SharedPredictor;

/// A trainable numeric model mapping input vectors to output vectors
pub trait Predictor: Send + 'static {
    /// Create an untrained predictor with the given layer widths
    fn build(shape: &NetworkShape, activation: Activation) -> Result<Self>
    where
        Self: Sized;

    /// Rebuild a predictor from bytes previously written by [`Predictor::export`]
    fn restore(source: &mut dyn Read) -> Result<Self>
    where
        Self: Sized;

    fn shape(&self) -> &NetworkShape;

    fn predict(&self, input: &[f64]) -> Vec<f64>;

    /// Adjust internal state over `epochs` passes of the whole batch
    fn train(&mut self, samples: &[TrainingSample], epochs: usize, rate: f64, debug: bool);

    fn export(&self, sink: &mut dyn Write) -> Result<()>;
}
