//! Recommendation job configuration

use crate::histogram::HistogramOptions;
use chrono::Duration;
use serde::Deserialize;

/// Settings for one recommendation job run
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Maximum number of items read and processed per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Items a step may give up on before the step fails
    #[serde(default = "default_skip_limit")]
    pub skip_limit: usize,

    /// Retries of a single item after a transient failure
    #[serde(default = "default_item_retry_limit")]
    pub item_retry_limit: u32,

    /// Attempts at the billing cost query before reporting no data
    #[serde(default = "default_cost_query_retries")]
    pub cost_query_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_pod_cache_capacity")]
    pub pod_cache_capacity: usize,

    /// Retention of saved recommendations, counted from the flush
    #[serde(default = "default_recommendation_ttl_days")]
    pub recommendation_ttl_days: i64,

    #[serde(default = "default_cost_lookback_days")]
    pub cost_lookback_days: i64,

    /// Container state schema versions this engine understands
    #[serde(default = "default_accepted_sample_versions")]
    pub accepted_sample_versions: Vec<u32>,

    /// Width of the window in which only the memory peak is kept
    #[serde(default = "default_memory_aggregation_interval_hours")]
    pub memory_aggregation_interval_hours: i64,

    #[serde(default = "default_histogram_half_life_hours")]
    pub histogram_half_life_hours: i64,

    #[serde(default = "PolicyConfig::burstable")]
    pub burstable: PolicyConfig,

    #[serde(default = "PolicyConfig::guaranteed")]
    pub guaranteed: PolicyConfig,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_skip_limit() -> usize {
    50
}

fn default_item_retry_limit() -> u32 {
    1
}

fn default_cost_query_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_pod_cache_capacity() -> usize {
    crate::identity::DEFAULT_POD_CACHE_CAPACITY
}

fn default_recommendation_ttl_days() -> i64 {
    30
}

fn default_cost_lookback_days() -> i64 {
    7
}

fn default_accepted_sample_versions() -> Vec<u32> {
    vec![1, 2]
}

fn default_memory_aggregation_interval_hours() -> i64 {
    24
}

fn default_histogram_half_life_hours() -> i64 {
    24
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            skip_limit: default_skip_limit(),
            item_retry_limit: default_item_retry_limit(),
            cost_query_retries: default_cost_query_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            pod_cache_capacity: default_pod_cache_capacity(),
            recommendation_ttl_days: default_recommendation_ttl_days(),
            cost_lookback_days: default_cost_lookback_days(),
            accepted_sample_versions: default_accepted_sample_versions(),
            memory_aggregation_interval_hours: default_memory_aggregation_interval_hours(),
            histogram_half_life_hours: default_histogram_half_life_hours(),
            burstable: PolicyConfig::burstable(),
            guaranteed: PolicyConfig::guaranteed(),
        }
    }
}

impl JobConfig {
    pub fn histogram_settings(&self) -> HistogramSettings {
        HistogramSettings {
            cpu: HistogramOptions::cpu(),
            memory: HistogramOptions::memory(),
            half_life: Duration::hours(self.histogram_half_life_hours),
            memory_interval: Duration::hours(self.memory_aggregation_interval_hours),
        }
    }

    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }
}

/// Bucket layouts and decay shared by every container state of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSettings {
    pub cpu: HistogramOptions,
    pub memory: HistogramOptions,
    pub half_life: Duration,
    pub memory_interval: Duration,
}

impl Default for HistogramSettings {
    fn default() -> Self {
        JobConfig::default().histogram_settings()
    }
}

/// Percentile policy behind one named recommendation
///
/// A recommended value is `max(percentile * (1 + safety_margin), minimum)`.
/// Limits are only emitted when a limit percentile is set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyConfig {
    pub cpu_request_percentile: f64,
    pub memory_request_percentile: f64,
    #[serde(default)]
    pub cpu_limit_percentile: Option<f64>,
    #[serde(default)]
    pub memory_limit_percentile: Option<f64>,
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,
    #[serde(default = "default_min_cpu_cores")]
    pub min_cpu_cores: f64,
    #[serde(default = "default_min_memory_bytes")]
    pub min_memory_bytes: f64,
}

fn default_safety_margin() -> f64 {
    0.15
}

fn default_min_cpu_cores() -> f64 {
    0.025
}

fn default_min_memory_bytes() -> f64 {
    250.0 * 1024.0 * 1024.0
}

impl PolicyConfig {
    /// Cost-efficient sizing: median requests, memory limit at p95
    pub fn burstable() -> Self {
        Self {
            cpu_request_percentile: 0.5,
            memory_request_percentile: 0.5,
            cpu_limit_percentile: None,
            memory_limit_percentile: Some(0.95),
            safety_margin: default_safety_margin(),
            min_cpu_cores: default_min_cpu_cores(),
            min_memory_bytes: default_min_memory_bytes(),
        }
    }

    /// Reliable sizing: requests equal limits at p95
    pub fn guaranteed() -> Self {
        Self {
            cpu_request_percentile: 0.95,
            memory_request_percentile: 0.95,
            cpu_limit_percentile: Some(0.95),
            memory_limit_percentile: Some(0.95),
            safety_margin: default_safety_margin(),
            min_cpu_cores: default_min_cpu_cores(),
            min_memory_bytes: default_min_memory_bytes(),
        }
    }
}
