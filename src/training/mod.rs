//! Training control loop
//!
//! Rounding, verification with online correction, and hierarchical training.

pub mod corrections;
pub mod hierarchical;
pub mod rounding;
pub mod verification;

pub use corrections::CorrectionWorker;
pub use hierarchical::{train_hierarchical, HierarchyReport, RoundSummary, MAX_DEPTH};
pub use rounding::RoundingPolicy;
pub use verification::{verify_and_maybe_retrain, VerificationOutcome, VerifyOptions};
