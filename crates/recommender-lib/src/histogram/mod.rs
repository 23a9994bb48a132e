//! Bucketed usage histograms
//!
//! This module provides:
//! - Exponential bucket layouts for cpu and memory values
//! - A decaying histogram where older samples carry less weight
//! - Compact checkpoints for persisting histograms between job runs

mod decaying;
mod options;

pub use decaying::{DecayingHistogram, HistogramCheckpoint, MAX_CHECKPOINT_WEIGHT};
pub use options::{HistogramOptions, EPSILON};
