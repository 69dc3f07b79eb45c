//! Fully connected feed-forward network
//!
//! Architecture: Input(n) → [Linear → activation] × hidden → Linear → Output(m)

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::{leaky_relu, relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{RecommenderError, Result};

/// Layer widths of a network: input, hidden layers in order, output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkShape {
    pub input: usize,
    pub hidden: Vec<usize>,
    pub output: usize,
}

impl NetworkShape {
    pub fn new(input: usize, hidden: Vec<usize>, output: usize) -> Self {
        NetworkShape {
            input,
            hidden,
            output,
        }
    }

    /// Build a shape from a flat list of widths, e.g. `[2, 5, 5, 2]`
    pub fn from_layers(layers: &[usize]) -> Result<Self> {
        if layers.len() < 2 {
            return Err(RecommenderError::Construction(format!(
                "need at least an input and an output layer, got {} layers",
                layers.len()
            )));
        }
        let shape = NetworkShape {
            input: layers[0],
            hidden: layers[1..layers.len() - 1].to_vec(),
            output: layers[layers.len() - 1],
        };
        shape.validate()?;
        Ok(shape)
    }

    /// All widths in order, input first
    pub fn layers(&self) -> Vec<usize> {
        let mut layers = Vec::with_capacity(self.hidden.len() + 2);
        layers.push(self.input);
        layers.extend(self.hidden.iter().copied());
        layers.push(self.output);
        layers
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(pos) = self.layers().iter().position(|&w| w == 0) {
            return Err(RecommenderError::Construction(format!(
                "layer {} has zero width",
                pos
            )));
        }
        Ok(())
    }
}

impl fmt::Display for NetworkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<String> = self.layers().iter().map(|w| w.to_string()).collect();
        write!(f, "[{}]", widths.join(", "))
    }
}

/// Activation applied after every hidden layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    BentIdentity,
    ReLU,
    LeakyReLU,
    ArSinH,
}

impl Activation {
    pub const ALL: [Activation; 5] = [
        Activation::Sigmoid,
        Activation::BentIdentity,
        Activation::ReLU,
        Activation::LeakyReLU,
        Activation::ArSinH,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "Sigmoid",
            Activation::BentIdentity => "BentIdentity",
            Activation::ReLU => "ReLU",
            Activation::LeakyReLU => "LeakyReLU",
            Activation::ArSinH => "ArSinH",
        }
    }

    pub fn apply<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::ReLU => relu(x),
            Activation::LeakyReLU => leaky_relu(x, 0.01),
            // (sqrt(x² + 1) - 1) / 2 + x
            Activation::BentIdentity => {
                let curve = x
                    .clone()
                    .powf_scalar(2.0)
                    .add_scalar(1.0)
                    .sqrt()
                    .sub_scalar(1.0)
                    .div_scalar(2.0);
                curve + x
            }
            // ln(x + sqrt(x² + 1))
            Activation::ArSinH => {
                let root = x.clone().powf_scalar(2.0).add_scalar(1.0).sqrt();
                (x + root).log()
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        // "Sigmond" is accepted for snapshots and configs written by older tooling
        if wanted == "sigmond" {
            return Ok(Activation::Sigmoid);
        }
        Activation::ALL
            .iter()
            .copied()
            .find(|a| a.name().to_lowercase() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown activation: {}. Use Sigmoid, BentIdentity, ReLU, LeakyReLU or ArSinH.",
                    s
                )
            })
    }
}

/// Stack of linear layers
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> FeedForward<B> {
    /// Create a freshly initialised network for the given shape
    pub fn new(device: &B::Device, shape: &NetworkShape) -> Self {
        let layers = shape
            .layers()
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).init(device))
            .collect();

        FeedForward { layers }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Inputs [batch, input]
    /// * `activation` - Applied after every layer except the last
    ///
    /// # Returns
    /// Outputs [batch, output]
    pub fn forward(&self, x: Tensor<B, 2>, activation: Activation) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);
        let mut x = x;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i < last {
                x = activation.apply(x);
            }
        }
        x
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}
