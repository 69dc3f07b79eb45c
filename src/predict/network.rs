//! burn-backed predictor

use std::io::{Read, Write};

use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use serde::{Deserialize, Serialize};

use crate::model::{Activation, FeedForward, NetworkShape};
use crate::predict::Predictor;
use crate::{RecommenderError, Result, TrainingSample};

/// CPU predictor used by the binary
pub type DefaultPredictor = NetworkPredictor<Autodiff<NdArray<f32>>>;

/// On-disk form of a network: enough to rebuild the module, plus its weights
#[derive(Serialize, Deserialize)]
struct Snapshot {
    shape: NetworkShape,
    activation: Activation,
    /// Module record encoded with `NamedMpkBytesRecorder`
    weights: Vec<u8>,
}

/// Batch of samples as tensors
#[derive(Debug, Clone)]
struct SampleBatch<B: Backend> {
    /// [batch, input]
    inputs: Tensor<B, 2>,
    /// [batch, output]
    targets: Tensor<B, 2>,
}

impl<B: Backend> SampleBatch<B> {
    fn new(samples: &[&TrainingSample], shape: &NetworkShape, device: &B::Device) -> Self {
        let batch_size = samples.len();

        let mut input_data = Vec::with_capacity(batch_size * shape.input);
        let mut target_data = Vec::with_capacity(batch_size * shape.output);
        for sample in samples {
            input_data.extend(sample.input.iter().map(|&v| v as f32));
            target_data.extend(sample.output.iter().map(|&v| v as f32));
        }

        let inputs = Tensor::<B, 1>::from_floats(input_data.as_slice(), device)
            .reshape([batch_size, shape.input]);
        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), device)
            .reshape([batch_size, shape.output]);

        SampleBatch { inputs, targets }
    }
}

/// Feed-forward network trained with plain SGD on mean squared error
pub struct NetworkPredictor<B: AutodiffBackend> {
    model: FeedForward<B>,
    shape: NetworkShape,
    activation: Activation,
    device: B::Device,
}

impl<B: AutodiffBackend> NetworkPredictor<B> {
    /// Create a new predictor on an explicit device
    pub fn new(device: B::Device, shape: NetworkShape, activation: Activation) -> Result<Self> {
        shape.validate()?;
        let model = FeedForward::new(&device, &shape);

        Ok(NetworkPredictor {
            model,
            shape,
            activation,
            device,
        })
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn fits(&self, sample: &TrainingSample) -> bool {
        sample.input.len() == self.shape.input && sample.output.len() == self.shape.output
    }
}

impl<B: AutodiffBackend> Predictor for NetworkPredictor<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    fn build(shape: &NetworkShape, activation: Activation) -> Result<Self> {
        Self::new(B::Device::default(), shape.clone(), activation)
    }

    fn restore(source: &mut dyn Read) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_reader(source)
            .map_err(|e| RecommenderError::Restore(e.to_string()))?;
        snapshot
            .shape
            .validate()
            .map_err(|e| RecommenderError::Restore(e.to_string()))?;

        let device = B::Device::default();
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let record = Recorder::<B>::load(&recorder, snapshot.weights, &device)
            .map_err(|e| RecommenderError::Restore(e.to_string()))?;

        let model = FeedForward::new(&device, &snapshot.shape).load_record(record);

        log::info!(
            "Restored network {} ({})",
            snapshot.shape,
            snapshot.activation
        );

        Ok(NetworkPredictor {
            model,
            shape: snapshot.shape,
            activation: snapshot.activation,
            device,
        })
    }

    fn shape(&self) -> &NetworkShape {
        &self.shape
    }

    fn predict(&self, input: &[f64]) -> Vec<f64> {
        if input.len() != self.shape.input {
            log::warn!(
                "Ignoring prediction for {} inputs, network expects {}",
                input.len(),
                self.shape.input
            );
            return Vec::new();
        }

        let values: Vec<f32> = input.iter().map(|&v| v as f32).collect();
        let x = Tensor::<B, 1>::from_floats(values.as_slice(), &self.device)
            .reshape([1, self.shape.input]);

        let data = self.model.forward(x, self.activation).into_data();
        data.iter::<f32>().map(f64::from).collect()
    }

    fn train(&mut self, samples: &[TrainingSample], epochs: usize, rate: f64, debug: bool) {
        let usable: Vec<&TrainingSample> = samples.iter().filter(|s| self.fits(s)).collect();
        if usable.len() < samples.len() {
            log::warn!(
                "Skipping {} of {} samples that do not match shape {}",
                samples.len() - usable.len(),
                samples.len(),
                self.shape
            );
        }
        if usable.is_empty() || epochs == 0 {
            return;
        }

        let batch = SampleBatch::<B>::new(&usable, &self.shape, &self.device);
        let mut optimizer = SgdConfig::new().init();

        let level = if debug {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        let report_every = (epochs / 10).max(1);

        for epoch in 0..epochs {
            let output = self.model.forward(batch.inputs.clone(), self.activation);
            let loss = (output - batch.targets.clone()).powf_scalar(2.0).mean();

            if log::log_enabled!(level) && (epoch % report_every == 0 || epoch + 1 == epochs) {
                let loss_val: f32 = loss.clone().into_scalar().elem();
                log::log!(
                    level,
                    "Epoch {}/{}: samples={}, loss={:.6}",
                    epoch + 1,
                    epochs,
                    usable.len(),
                    loss_val
                );
            }

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = optimizer.step(rate, self.model.clone(), grads);
        }
    }

    fn export(&self, sink: &mut dyn Write) -> Result<()> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let weights = Recorder::<B>::record(&recorder, self.model.clone().into_record(), ())
            .map_err(|e| RecommenderError::Export(e.to_string()))?;

        let snapshot = Snapshot {
            shape: self.shape.clone(),
            activation: self.activation,
            weights,
        };
        serde_json::to_writer(&mut *sink, &snapshot)
            .map_err(|e| RecommenderError::Export(e.to_string()))?;
        sink.flush()
            .map_err(|e| RecommenderError::Export(e.to_string()))
    }
}
