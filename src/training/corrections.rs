//! Background worker applying single-sample corrective retrains
//!
//! Corrections are queued and applied one at a time against the shared predictor.
//! Callers never wait for them; dropping or draining the worker closes the queue and
//! blocks until everything already queued has been applied.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::predict::{Predictor, SharedPredictor};
use crate::{Result, TrainingSample};

pub struct CorrectionWorker {
    tx: Option<mpsc::Sender<TrainingSample>>,
    handle: Option<JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
    applied: Arc<AtomicUsize>,
}

impl CorrectionWorker {
    pub fn spawn<P: Predictor>(predictor: SharedPredictor<P>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<TrainingSample>();
        let queued = Arc::new(AtomicUsize::new(0));
        let applied = Arc::new(AtomicUsize::new(0));

        let worker_queued = Arc::clone(&queued);
        let worker_applied = Arc::clone(&applied);
        let handle = thread::Builder::new()
            .name("corrections".to_string())
            .spawn(move || {
                for sample in rx {
                    log::debug!("Applying correction for input {:?}", sample.input);
                    predictor.correct(&sample);
                    worker_applied.fetch_add(1, Ordering::SeqCst);
                    worker_queued.fetch_sub(1, Ordering::SeqCst);
                }
            })?;

        Ok(CorrectionWorker {
            tx: Some(tx),
            handle: Some(handle),
            queued,
            applied,
        })
    }

    /// Queue a retrain on one sample and return immediately
    pub fn submit(&self, sample: TrainingSample) {
        let Some(tx) = &self.tx else {
            log::warn!("Correction queue closed, dropping sample {:?}", sample.input);
            return;
        };
        self.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = tx.send(sample) {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            log::warn!("Correction worker gone, dropping sample {:?}", e.0.input);
        }
    }

    /// Corrections queued but not yet applied
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Corrections applied so far
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    /// Close the queue and wait for every queued correction to land.
    ///
    /// Returns the total number of corrections applied over the worker's lifetime.
    pub fn drain(mut self) -> usize {
        self.close();
        self.applied()
    }

    fn close(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let pending = self.pending();
            if pending > 0 {
                log::info!("Waiting for {} pending corrections", pending);
            }
            if handle.join().is_err() {
                log::warn!("Correction worker panicked, remaining corrections abandoned");
            }
        }
    }
}

impl Drop for CorrectionWorker {
    fn drop(&mut self) {
        self.close();
    }
}
