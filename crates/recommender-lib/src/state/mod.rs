//! Per-container usage state
//!
//! A `ContainerUsageState` is rebuilt from its checkpoint at the start of a
//! run, advanced one sample at a time by `accumulate`, and written back as a
//! checkpoint when the owning workload is flushed.

mod checkpoint;
mod container;

pub use checkpoint::ContainerCheckpoint;
pub use container::{accumulate, ContainerUsageState};
