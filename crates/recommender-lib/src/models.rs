//! Core data models for the recommendation engine

use crate::histogram::HistogramCheckpoint;
use crate::identity::{PodIdentity, ResourceIdentity};
use crate::state::ContainerCheckpoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource name to Kubernetes quantity string
pub type ResourceMap = BTreeMap<String, String>;

/// Requests and limits of a single container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    #[serde(default)]
    pub requests: ResourceMap,
    #[serde(default)]
    pub limits: ResourceMap,
}

impl ResourceRequirement {
    pub fn request(&self, resource: &str) -> Option<&str> {
        self.requests.get(resource).map(String::as_str)
    }

    pub fn limit(&self, resource: &str) -> Option<&str> {
        self.limits.get(resource).map(String::as_str)
    }
}

/// Recommendation state of one container within a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecommendation {
    pub container_name: String,
    /// Declared resources, absent until a spec event is seen
    pub current: Option<ResourceRequirement>,
    pub burstable: Option<ResourceRequirement>,
    pub guaranteed: Option<ResourceRequirement>,
    pub num_days: i64,
    pub total_samples_count: u64,
}

impl ContainerRecommendation {
    pub fn new(container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            ..Default::default()
        }
    }
}

/// The persisted unit: one document per workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecommendation {
    pub identity: ResourceIdentity,
    #[serde(default)]
    pub container_recommendations: BTreeMap<String, ContainerRecommendation>,
    #[serde(default)]
    pub container_checkpoints: BTreeMap<String, ContainerCheckpoint>,
    /// Fewest days of data among computable containers
    #[serde(default)]
    pub num_days: i64,
    #[serde(default)]
    pub total_samples_count: u64,
    /// Projected monthly savings; positive means spend goes down
    #[serde(default)]
    pub estimated_savings: Option<f64>,
    #[serde(default)]
    pub last_day_cost_available: bool,
    #[serde(default)]
    pub valid_recommendation: bool,
    #[serde(default)]
    pub last_received_util_data_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_computed_recommendation_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ttl: Option<DateTime<Utc>>,
    /// Set when a declared spec changed and recommendations need recomputing
    #[serde(default)]
    pub dirty: bool,
}

impl WorkloadRecommendation {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self {
            identity,
            container_recommendations: BTreeMap::new(),
            container_checkpoints: BTreeMap::new(),
            num_days: 0,
            total_samples_count: 0,
            estimated_savings: None,
            last_day_cost_available: false,
            valid_recommendation: false,
            last_received_util_data_at: None,
            last_computed_recommendation_at: None,
            ttl: None,
            dirty: false,
        }
    }

    pub fn container_mut(&mut self, container_name: &str) -> &mut ContainerRecommendation {
        self.container_recommendations
            .entry(container_name.to_string())
            .or_insert_with(|| ContainerRecommendation::new(container_name))
    }
}

/// Billing cost of a workload for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSample {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
}

impl CostSample {
    pub fn for_resource(&self, resource: &str) -> Option<f64> {
        match resource {
            crate::quantity::CPU => self.cpu,
            crate::quantity::MEMORY => self.memory,
            _ => None,
        }
    }
}

/// Declared resources of one container in a spec event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub requests: ResourceMap,
    #[serde(default)]
    pub limits: ResourceMap,
}

/// A workload's declared container resources changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpecEvent {
    pub account_id: String,
    pub cluster_id: String,
    pub namespace: String,
    pub workload_name: String,
    pub workload_kind: String,
    pub containers: BTreeMap<String, ContainerSpec>,
    pub timestamp: DateTime<Utc>,
}

impl WorkloadSpecEvent {
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(
            &self.account_id,
            &self.cluster_id,
            &self.namespace,
            &self.workload_name,
            &self.workload_kind,
        )
    }
}

/// Aggregated usage of one container over a reporting interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStateSample {
    pub account_id: String,
    pub cluster_id: String,
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub version: u32,
    pub first_sample_start: DateTime<Utc>,
    pub last_sample_start: DateTime<Utc>,
    pub total_samples_count: u64,
    pub cpu_histogram: HistogramCheckpoint,
    /// Highest memory usage in bytes seen during the interval
    pub memory_peak: f64,
    pub memory_peak_time: DateTime<Utc>,
}

impl ContainerStateSample {
    pub fn pod(&self) -> PodIdentity {
        PodIdentity::new(
            &self.account_id,
            &self.cluster_id,
            &self.namespace,
            &self.pod_name,
        )
    }
}
