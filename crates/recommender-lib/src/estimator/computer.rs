//! Applies the recommendation policies to every container of a workload

use super::{Estimator, PercentileEstimator};
use crate::config::JobConfig;
use crate::models::{ResourceMap, ResourceRequirement, WorkloadRecommendation};
use crate::quantity::is_extended_resource;
use crate::state::ContainerUsageState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Summary of a workload recomputation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputedWorkload {
    pub computed_containers: usize,
    pub num_days: i64,
    pub total_samples_count: u64,
}

pub struct RecommendationComputer {
    burstable: Box<dyn Estimator>,
    guaranteed: Box<dyn Estimator>,
}

impl RecommendationComputer {
    pub fn new(burstable: Box<dyn Estimator>, guaranteed: Box<dyn Estimator>) -> Self {
        Self {
            burstable,
            guaranteed,
        }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(
            Box::new(PercentileEstimator::burstable(config.burstable.clone())),
            Box::new(PercentileEstimator::guaranteed(config.guaranteed.clone())),
        )
    }

    /// Burstable and guaranteed requirements for one container
    pub fn compute_container(
        &self,
        current: &ResourceRequirement,
        state: &ContainerUsageState,
    ) -> Option<(ResourceRequirement, ResourceRequirement)> {
        let mut burstable = self.burstable.estimate(state)?;
        let mut guaranteed = self.guaranteed.estimate(state)?;
        let extended = extended_resources(current);
        for (resource, quantity) in &extended {
            burstable
                .requests
                .entry(resource.clone())
                .or_insert_with(|| quantity.clone());
            guaranteed
                .requests
                .entry(resource.clone())
                .or_insert_with(|| quantity.clone());
        }
        Some((burstable, guaranteed))
    }

    /// Recompute every container that has both a declared spec and usage state
    pub fn compute_workload(
        &self,
        recommendation: &mut WorkloadRecommendation,
        states: &BTreeMap<String, ContainerUsageState>,
        now: DateTime<Utc>,
    ) -> ComputedWorkload {
        let mut summary = ComputedWorkload::default();
        let mut min_days: Option<i64> = None;

        for (name, state) in states {
            let Some(container) = recommendation.container_recommendations.get_mut(name) else {
                debug!(workload = %recommendation.identity, container = %name, "No declared spec yet");
                continue;
            };
            let Some(current) = container.current.as_ref() else {
                continue;
            };
            let Some((burstable, guaranteed)) = self.compute_container(current, state) else {
                continue;
            };

            container.burstable = Some(burstable);
            container.guaranteed = Some(guaranteed);
            container.num_days = state.num_days();
            container.total_samples_count = state.total_samples_count();

            summary.computed_containers += 1;
            summary.total_samples_count += state.total_samples_count();
            min_days = Some(min_days.map_or(state.num_days(), |d| d.min(state.num_days())));
        }

        summary.num_days = min_days.unwrap_or(0);
        recommendation.num_days = summary.num_days;
        recommendation.total_samples_count = summary.total_samples_count;
        recommendation.valid_recommendation = summary.computed_containers > 0;
        recommendation.last_computed_recommendation_at = Some(now);
        recommendation.dirty = false;
        summary
    }
}

/// Non cpu/memory resources of the current spec; requests win over limits
fn extended_resources(current: &ResourceRequirement) -> ResourceMap {
    let mut extended = ResourceMap::new();
    for (resource, quantity) in current.limits.iter().chain(current.requests.iter()) {
        if is_extended_resource(resource) {
            extended.insert(resource.clone(), quantity.clone());
        }
    }
    extended
}
