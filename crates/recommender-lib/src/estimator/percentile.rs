//! Percentile-with-margin estimator

use super::Estimator;
use crate::config::PolicyConfig;
use crate::histogram::DecayingHistogram;
use crate::models::ResourceRequirement;
use crate::quantity::{format_cpu, format_memory, CPU, MEMORY};
use crate::state::ContainerUsageState;

pub struct PercentileEstimator {
    name: String,
    policy: PolicyConfig,
}

impl PercentileEstimator {
    pub fn new(name: impl Into<String>, policy: PolicyConfig) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    pub fn burstable(policy: PolicyConfig) -> Self {
        Self::new("burstable", policy)
    }

    pub fn guaranteed(policy: PolicyConfig) -> Self {
        Self::new("guaranteed", policy)
    }

    fn scaled(&self, histogram: &DecayingHistogram, percentile: f64, minimum: f64) -> f64 {
        (histogram.percentile(percentile) * (1.0 + self.policy.safety_margin)).max(minimum)
    }
}

impl Estimator for PercentileEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimate(&self, state: &ContainerUsageState) -> Option<ResourceRequirement> {
        let cpu = state.cpu_histogram();
        let memory = state.memory_histogram();
        if cpu.is_empty() && memory.is_empty() {
            return None;
        }

        let policy = &self.policy;
        let mut requirement = ResourceRequirement::default();

        if !cpu.is_empty() {
            let request = self.scaled(cpu, policy.cpu_request_percentile, policy.min_cpu_cores);
            requirement.requests.insert(CPU.to_string(), format_cpu(request));
            if let Some(p) = policy.cpu_limit_percentile {
                let limit = self.scaled(cpu, p, policy.min_cpu_cores).max(request);
                requirement.limits.insert(CPU.to_string(), format_cpu(limit));
            }
        }

        if !memory.is_empty() {
            let request = self.scaled(
                memory,
                policy.memory_request_percentile,
                policy.min_memory_bytes,
            );
            requirement
                .requests
                .insert(MEMORY.to_string(), format_memory(request));
            if let Some(p) = policy.memory_limit_percentile {
                let limit = self.scaled(memory, p, policy.min_memory_bytes).max(request);
                requirement
                    .limits
                    .insert(MEMORY.to_string(), format_memory(limit));
            }
        }

        Some(requirement)
    }
}
