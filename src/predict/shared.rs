//! Mutex-guarded predictor shared between the serving path and the correction worker

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::NetworkShape;
use crate::predict::Predictor;
use crate::{Result, TrainingParameters, TrainingSample};

/// The predictor together with the parameters bound to it
struct Resident<P> {
    predictor: P,
    params: TrainingParameters,
}

/// Cloneable handle to the single resident predictor.
///
/// Every operation holds the lock for its whole duration, so a prediction never sees
/// a half-applied training update and concurrent trainings run one after another.
pub struct SharedPredictor<P: Predictor> {
    inner: Arc<Mutex<Resident<P>>>,
}

impl<P: Predictor> Clone for SharedPredictor<P> {
    fn clone(&self) -> Self {
        SharedPredictor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Predictor> SharedPredictor<P> {
    pub fn new(predictor: P, params: TrainingParameters) -> Self {
        SharedPredictor {
            inner: Arc::new(Mutex::new(Resident { predictor, params })),
        }
    }

    pub fn predict(&self, input: &[f64]) -> Vec<f64> {
        self.inner.lock().predictor.predict(input)
    }

    /// Batch-train with explicit parameters
    pub fn train(&self, samples: &[TrainingSample], params: &TrainingParameters) {
        let mut resident = self.inner.lock();
        resident
            .predictor
            .train(samples, params.epochs, params.rate, params.debug);
    }

    /// Single-sample retrain using the currently bound epochs and rate, always verbose
    pub fn correct(&self, sample: &TrainingSample) {
        let mut resident = self.inner.lock();
        let params = resident.params;
        resident.predictor.train(
            std::slice::from_ref(sample),
            params.epochs,
            params.rate,
            true,
        );
    }

    /// Replace the parameters used by later corrections
    pub fn bind(&self, params: TrainingParameters) {
        self.inner.lock().params = params;
    }

    pub fn params(&self) -> TrainingParameters {
        self.inner.lock().params
    }

    pub fn shape(&self) -> NetworkShape {
        self.inner.lock().predictor.shape().clone()
    }

    pub fn export(&self, sink: &mut dyn Write) -> Result<()> {
        self.inner.lock().predictor.export(sink)
    }

    /// Run a read-only closure against the predictor while holding the lock
    pub fn inspect<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.inner.lock().predictor)
    }
}
