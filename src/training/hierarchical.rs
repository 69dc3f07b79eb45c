//! Hierarchical ("N-level") training
//!
//! Each round trains on the first half of the remaining samples, verifies the second
//! half, and carries only the failures into the next round:
//!
//! ```text
//! round 0:  [ train ....... | verify ....... ]
//!                                   └─ failures
//! round 1:                  [ train | verify ]
//!                                      └─ failures ...
//! ```
//!
//! Rounds stop when nothing is left or after `MAX_DEPTH + 1` rounds.

use crate::predict::{Predictor, SharedPredictor};
use crate::training::corrections::CorrectionWorker;
use crate::training::rounding::RoundingPolicy;
use crate::training::verification::{verify_and_maybe_retrain, VerifyOptions};
use crate::{TrainingParameters, TrainingSet};

/// Deepest round that still trains; round `MAX_DEPTH + 1` never runs
pub const MAX_DEPTH: usize = 10;

/// Precision used by the per-round verification gate
pub const GATE_PRECISION: i32 = 5;

/// What happened in one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub depth: usize,
    pub trained: usize,
    pub verified: usize,
    pub failed: usize,
}

/// Per-round record of a hierarchical run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    pub rounds: Vec<RoundSummary>,
    /// Failures still outstanding when the depth limit was hit
    pub abandoned: usize,
}

impl HierarchyReport {
    pub fn depth_reached(&self) -> usize {
        self.rounds.last().map(|r| r.depth).unwrap_or(0)
    }
}

/// Split at `len / 2`; the first part gets the smaller share when the length is odd
pub fn split_halves(mut dataset: TrainingSet) -> (TrainingSet, TrainingSet) {
    let second = dataset.split_off(dataset.len() / 2);
    (dataset, second)
}

/// Train `predictor` on `dataset` round by round, focusing on what it still gets wrong.
///
/// `params` become the predictor's bound parameters before the first round, so
/// corrections fired by the verification gate use them too.
pub fn train_hierarchical<P: Predictor>(
    predictor: &SharedPredictor<P>,
    corrections: &CorrectionWorker,
    dataset: TrainingSet,
    params: TrainingParameters,
) -> HierarchyReport {
    let gate = VerifyOptions::new(RoundingPolicy::Identity, GATE_PRECISION);
    let mut report = HierarchyReport::default();
    let mut remaining = dataset;
    let mut depth = 0;

    predictor.bind(params);
    log::info!(
        "Starting hierarchical training on {} samples ({})",
        remaining.len(),
        params
    );

    while depth <= MAX_DEPTH && !remaining.is_empty() {
        let (train_part, verify_part) = split_halves(remaining);
        predictor.train(&train_part, &params);

        let mut failures = TrainingSet::new();
        for sample in verify_part.iter() {
            let outcome = verify_and_maybe_retrain(
                predictor,
                corrections,
                &sample.input,
                sample.output.clone(),
                &gate,
            );
            if !outcome.verified {
                failures.push(sample.clone());
            }
        }

        let summary = RoundSummary {
            depth,
            trained: train_part.len(),
            verified: verify_part.len() - failures.len(),
            failed: failures.len(),
        };
        log::info!(
            "Round {}: trained on {}, verified {}/{}",
            depth,
            summary.trained,
            summary.verified,
            verify_part.len()
        );
        report.rounds.push(summary);

        remaining = failures;
        depth += 1;
    }

    if !remaining.is_empty() {
        log::info!(
            "Depth limit reached with {} samples still failing verification",
            remaining.len()
        );
        report.abandoned = remaining.len();
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::scripted::ScriptedPredictor;
    use crate::TrainingSample;

    fn dataset(n: usize) -> TrainingSet {
        (0..n)
            .map(|i| TrainingSample::new(vec![i as f64], vec![1.0]))
            .collect()
    }

    fn params() -> TrainingParameters {
        TrainingParameters {
            epochs: 4,
            rate: 0.25,
            debug: false,
        }
    }

    fn run(
        predictor: ScriptedPredictor,
        data: TrainingSet,
    ) -> (HierarchyReport, SharedPredictor<ScriptedPredictor>) {
        let shared = SharedPredictor::new(predictor, TrainingParameters::default());
        let worker = CorrectionWorker::spawn(shared.clone()).unwrap();
        let report = train_hierarchical(&shared, &worker, data, params());
        worker.drain();
        (report, shared)
    }

    #[test]
    fn test_split_halves() {
        let (a, b) = split_halves(dataset(7));
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 4);
        assert_eq!(b[0].input, vec![3.0]);

        let (a, b) = split_halves(dataset(1));
        assert!(a.is_empty());
        assert_eq!(b.len(), 1);

        let (a, b) = split_halves(TrainingSet::new());
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn test_first_round_split_sizes() {
        for n in [1, 2, 5, 10, 11] {
            // Everything verifies, so only one round runs
            let predictor = ScriptedPredictor::new(1, 1).with_fallback(vec![1.0]);
            let (report, _) = run(predictor, dataset(n));

            let first = report.rounds[0];
            assert_eq!(first.trained, n / 2);
            assert_eq!(first.verified + first.failed, n - n / 2);
            assert_eq!(report.rounds.len(), 1);
        }
    }

    #[test]
    fn test_always_failing_terminates_at_depth_limit() {
        // Predicts 0 for everything while every target is 1
        let predictor = ScriptedPredictor::new(1, 1);
        let (report, shared) = run(predictor, dataset(64));

        assert!(report.rounds.len() <= MAX_DEPTH + 1);
        assert!(report.rounds.iter().all(|r| r.verified == 0));
        // 64 → 32 → 16 → 8 → 4 → 2 → 1 → 1 → ... until the limit
        assert_eq!(report.rounds.len(), MAX_DEPTH + 1);
        assert_eq!(report.depth_reached(), MAX_DEPTH);
        assert_eq!(report.abandoned, 1);

        // Batch trainings plus one correction per failed verification
        let failures: usize = report.rounds.iter().map(|r| r.failed).sum();
        let calls = shared.inspect(|p| p.train_calls().len());
        assert_eq!(calls, report.rounds.len() + failures);
    }

    #[test]
    fn test_rounds_train_with_given_params_and_bind_them() {
        let predictor = ScriptedPredictor::new(1, 1).with_fallback(vec![1.0]);
        let (_, shared) = run(predictor, dataset(6));

        let calls = shared.inspect(|p| p.train_calls().to_vec());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].samples, dataset(3));
        assert_eq!(calls[0].epochs, 4);
        assert_eq!(calls[0].rate, 0.25);
        assert!(!calls[0].debug);
        assert_eq!(shared.params(), params());
    }

    #[test]
    fn test_recurses_only_on_failures() {
        // Inputs 3 and 5 are predicted correctly, everything else misses
        let predictor = ScriptedPredictor::new(1, 1)
            .with_response(vec![3.0], vec![1.0])
            .with_response(vec![5.0], vec![1.0]);
        let (report, shared) = run(predictor, dataset(6));

        let first = report.rounds[0];
        assert_eq!(first.trained, 3);
        assert_eq!(first.verified, 2);
        assert_eq!(first.failed, 1);

        // Second round sees only sample 4: nothing to train, verify it alone
        let second = report.rounds[1];
        assert_eq!(second.trained, 0);
        assert_eq!(second.verified + second.failed, 1);

        let calls = shared.inspect(|p| p.train_calls().to_vec());
        assert_eq!(calls[0].samples, dataset(3));
    }

    #[test]
    fn test_empty_dataset() {
        let (report, shared) = run(ScriptedPredictor::new(1, 1), TrainingSet::new());
        assert!(report.rounds.is_empty());
        assert_eq!(report.abandoned, 0);
        assert!(shared.inspect(|p| p.train_calls().is_empty()));
        assert_eq!(shared.params(), params());
    }

    #[test]
    fn test_learning_predictor_converges_early() {
        // Corrections teach the double, but they land asynchronously, so only the
        // upper bound is guaranteed
        let predictor = ScriptedPredictor::new(1, 1).learning();
        let (report, _) = run(predictor, dataset(16));
        assert!(report.rounds.len() <= MAX_DEPTH + 1);
        assert_eq!(report.rounds[0].trained, 8);
    }
}
