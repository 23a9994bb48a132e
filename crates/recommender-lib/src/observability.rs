//! Observability infrastructure for recommendation jobs
//!
//! Provides:
//! - Prometheus metrics (items read/skipped per step, saves, cost gaps, step latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// Step durations range from milliseconds to tens of minutes
const STEP_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<JobMetricsInner> = OnceLock::new();

struct JobMetricsInner {
    items_read: IntCounterVec,
    items_skipped: IntCounterVec,
    items_retried: IntCounterVec,
    recommendations_saved: IntCounter,
    cost_unavailable: IntCounter,
    inventory_lookups: IntCounter,
    step_duration_seconds: HistogramVec,
}

impl JobMetricsInner {
    fn new() -> Self {
        Self {
            items_read: register_int_counter_vec!(
                "workload_recommender_items_read_total",
                "Items read by each job step",
                &["step"]
            )
            .expect("Failed to register items_read"),

            items_skipped: register_int_counter_vec!(
                "workload_recommender_items_skipped_total",
                "Items skipped by each job step, by reason",
                &["step", "reason"]
            )
            .expect("Failed to register items_skipped"),

            items_retried: register_int_counter_vec!(
                "workload_recommender_items_retried_total",
                "Item retries after transient failures",
                &["step"]
            )
            .expect("Failed to register items_retried"),

            recommendations_saved: register_int_counter!(
                "workload_recommender_recommendations_saved_total",
                "Workload recommendations written to the store"
            )
            .expect("Failed to register recommendations_saved"),

            cost_unavailable: register_int_counter!(
                "workload_recommender_cost_unavailable_total",
                "Workloads without billing data for the lookback window"
            )
            .expect("Failed to register cost_unavailable"),

            inventory_lookups: register_int_counter!(
                "workload_recommender_inventory_lookups_total",
                "Pod ownership lookups sent to the inventory"
            )
            .expect("Failed to register inventory_lookups"),

            step_duration_seconds: register_histogram_vec!(
                "workload_recommender_step_duration_seconds",
                "Wall time of each job step",
                &["step"],
                STEP_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register step_duration_seconds"),
        }
    }
}

/// Job metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct JobMetrics {
    _private: (),
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl JobMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(JobMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &JobMetricsInner {
        GLOBAL_METRICS.get_or_init(JobMetricsInner::new)
    }

    pub fn inc_items_read(&self, step: &str, count: usize) {
        self.inner()
            .items_read
            .with_label_values(&[step])
            .inc_by(count as u64);
    }

    pub fn inc_items_skipped(&self, step: &str, reason: &str) {
        self.inner()
            .items_skipped
            .with_label_values(&[step, reason])
            .inc();
    }

    pub fn inc_items_retried(&self, step: &str) {
        self.inner().items_retried.with_label_values(&[step]).inc();
    }

    pub fn inc_recommendations_saved(&self) {
        self.inner().recommendations_saved.inc();
    }

    pub fn inc_cost_unavailable(&self) {
        self.inner().cost_unavailable.inc();
    }

    pub fn inc_inventory_lookups(&self, count: u64) {
        self.inner().inventory_lookups.inc_by(count);
    }

    pub fn observe_step_duration(&self, step: &str, duration_secs: f64) {
        self.inner()
            .step_duration_seconds
            .with_label_values(&[step])
            .observe(duration_secs);
    }
}

/// Structured logger for job events
///
/// Provides consistent JSON-formatted logging for job progress,
/// rejected samples and saved recommendations.
#[derive(Clone)]
pub struct StructuredLogger {
    account_id: String,
}

impl StructuredLogger {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn log_job_started(&self, job_start: &str) {
        info!(
            event = "job_started",
            account_id = %self.account_id,
            job_start = %job_start,
            "Recommendation job started"
        );
    }

    pub fn log_step_finished(&self, step: &str, read: usize, processed: usize, skipped: usize) {
        info!(
            event = "step_finished",
            account_id = %self.account_id,
            step = %step,
            read = read,
            processed = processed,
            skipped = skipped,
            "Job step finished"
        );
    }

    pub fn log_step_failed(&self, step: &str, reason: &str) {
        error!(
            event = "step_failed",
            account_id = %self.account_id,
            step = %step,
            reason = %reason,
            "Job step failed"
        );
    }

    /// Rejected samples log at the level their cause deserves
    pub fn log_sample_rejected(&self, step: &str, reason: &str, details: &str) {
        match reason {
            // unresolved pods already warned once when the lookup missed
            "stale_or_duplicate" | "unresolved_pod" => {
                debug!(
                    event = "sample_rejected",
                    account_id = %self.account_id,
                    step = %step,
                    reason = %reason,
                    details = %details,
                    "Sample rejected"
                );
            }
            _ => {
                warn!(
                    event = "sample_rejected",
                    account_id = %self.account_id,
                    step = %step,
                    reason = %reason,
                    details = %details,
                    "Sample skipped"
                );
            }
        }
    }

    pub fn log_recommendation_saved(
        &self,
        workload: &str,
        containers: usize,
        num_days: i64,
        estimated_savings: Option<f64>,
    ) {
        info!(
            event = "recommendation_saved",
            account_id = %self.account_id,
            workload = %workload,
            containers = containers,
            num_days = num_days,
            estimated_savings = ?estimated_savings,
            "Workload recommendation saved"
        );
    }

    pub fn log_cost_unavailable(&self, workload: &str) {
        info!(
            event = "cost_unavailable",
            account_id = %self.account_id,
            workload = %workload,
            "No billing data in lookback window, keeping previous savings"
        );
    }

    pub fn log_job_finished(&self, success: bool, saved: usize) {
        if success {
            info!(
                event = "job_finished",
                account_id = %self.account_id,
                saved = saved,
                "Recommendation job finished"
            );
        } else {
            warn!(
                event = "job_finished",
                account_id = %self.account_id,
                saved = saved,
                "Recommendation job finished with a failed step"
            );
        }
    }
}
