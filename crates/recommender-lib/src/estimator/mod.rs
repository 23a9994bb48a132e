//! Resource recommendation policies
//!
//! Two named policies size every container from its usage histograms:
//! "burstable" favours cost efficiency while "guaranteed" favours
//! reliability. Both are pure functions of the histogram contents.

mod computer;
mod percentile;

pub use computer::{ComputedWorkload, RecommendationComputer};
pub use percentile::PercentileEstimator;

use crate::models::ResourceRequirement;
use crate::state::ContainerUsageState;

/// Trait for recommendation policies
pub trait Estimator: Send + Sync {
    /// Policy name, e.g. "burstable"
    fn name(&self) -> &str;

    /// Recommend requests and limits for cpu and memory.
    /// Returns `None` when the state holds no usable usage data.
    fn estimate(&self, state: &ContainerUsageState) -> Option<ResourceRequirement>;
}
