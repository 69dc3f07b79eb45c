//! Verified prediction with online correction
//!
//! A prediction is compared against the expected output after rounding both sides.
//! When they disagree the sample is queued for a corrective retrain and the caller
//! gets the (unverified) prediction straight away.

use crate::predict::{Predictor, SharedPredictor};
use crate::training::corrections::CorrectionWorker;
use crate::training::rounding::RoundingPolicy;
use crate::TrainingSample;

/// Maximum allowed difference between a rounded prediction and its rounded target
pub const DEFAULT_TOLERANCE: f64 = 0.00005;

/// How predictions are compared against expectations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyOptions {
    pub policy: RoundingPolicy,
    pub precision: i32,
    pub tolerance: f64,
}

impl VerifyOptions {
    pub fn new(policy: RoundingPolicy, precision: i32) -> Self {
        VerifyOptions {
            policy,
            precision,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Result of one verification
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub predicted: Vec<f64>,
    /// Expected output after rounding
    pub expected: Vec<f64>,
    pub verified: bool,
}

/// Compare a prediction against an already rounded expectation.
///
/// Only the overlapping prefix is compared; extra values on either side are ignored.
pub fn matches(predicted: &[f64], expected: &[f64], options: &VerifyOptions) -> bool {
    predicted.iter().zip(expected.iter()).all(|(&p, &e)| {
        let rounded = options.policy.round(p, options.precision);
        (e - rounded).abs() <= options.tolerance
    })
}

/// Predict `input`, verify it against `expected`, and queue a correction on mismatch.
///
/// `expected` is consumed and handed back rounded in the outcome. The correction, if
/// any, runs on the worker with the predictor's currently bound parameters.
pub fn verify_and_maybe_retrain<P: Predictor>(
    predictor: &SharedPredictor<P>,
    corrections: &CorrectionWorker,
    input: &[f64],
    mut expected: Vec<f64>,
    options: &VerifyOptions,
) -> VerificationOutcome {
    let predicted = predictor.predict(input);
    options.policy.round_all(&mut expected, options.precision);

    let verified = matches(&predicted, &expected, options);
    if !verified {
        log::debug!(
            "Prediction {:?} for {:?} does not match {:?}, queueing correction",
            predicted,
            input,
            expected
        );
        corrections.submit(TrainingSample::new(input.to_vec(), expected.clone()));
    }

    VerificationOutcome {
        predicted,
        expected,
        verified,
    }
}
