//! Neural network architecture
//!
//! A single configurable feed-forward network; the shape and activation come from
//! configuration or from a restored snapshot.

pub mod feed_forward;

pub use feed_forward::{Activation, FeedForward, NetworkShape};
