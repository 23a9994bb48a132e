//! Per-run state shared by the job steps

use crate::config::{HistogramSettings, JobConfig};
use crate::error::{RecommenderError, Result};
use crate::identity::{PodWorkloadResolver, ResourceIdentity};
use crate::models::WorkloadRecommendation;
use crate::observability::{JobMetrics, StructuredLogger};
use crate::sources::RecommendationStore;
use crate::state::ContainerUsageState;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::warn;

/// A workload loaded into memory between two flushes
#[derive(Debug, Clone)]
pub struct WorkloadState {
    pub recommendation: WorkloadRecommendation,
    pub containers: BTreeMap<String, ContainerUsageState>,
}

impl WorkloadState {
    /// Rebuild usage states from the checkpoints stored in the document
    ///
    /// A checkpoint that no longer fits the configured histogram layout is
    /// dropped and the container starts over.
    pub fn rehydrate(recommendation: WorkloadRecommendation, settings: &HistogramSettings) -> Self {
        let mut containers = BTreeMap::new();
        for (name, checkpoint) in &recommendation.container_checkpoints {
            match ContainerUsageState::from_checkpoint(checkpoint, settings) {
                Ok(state) => {
                    containers.insert(name.clone(), state);
                }
                Err(e) => {
                    warn!(
                        workload = %recommendation.identity,
                        container = %name,
                        error = %e,
                        "Discarding unreadable checkpoint"
                    );
                }
            }
        }
        Self {
            recommendation,
            containers,
        }
    }
}

/// Everything one job run owns: configuration, caches and instrumentation
pub struct JobContext {
    pub config: JobConfig,
    pub settings: HistogramSettings,
    /// Wall clock reference for the whole run
    pub job_start: DateTime<Utc>,
    pub resolver: PodWorkloadResolver,
    /// Workloads touched since the last flush
    pub workloads: BTreeMap<ResourceIdentity, WorkloadState>,
    pub metrics: JobMetrics,
    pub logger: StructuredLogger,
}

impl JobContext {
    pub fn new(account_id: impl Into<String>, config: JobConfig, job_start: DateTime<Utc>) -> Self {
        let settings = config.histogram_settings();
        let resolver = PodWorkloadResolver::new(config.pod_cache_capacity);
        Self {
            config,
            settings,
            job_start,
            resolver,
            workloads: BTreeMap::new(),
            metrics: JobMetrics::new(),
            logger: StructuredLogger::new(account_id),
        }
    }

    /// Start of the billing lookback window, aligned to midnight UTC
    pub fn cost_lookback_start(&self) -> DateTime<Utc> {
        let midnight = self.job_start.date_naive().and_time(chrono::NaiveTime::MIN);
        Utc.from_utc_datetime(&midnight) - Duration::days(self.config.cost_lookback_days)
    }

    /// Expiry stamped on every document saved by this run
    pub fn recommendation_ttl(&self) -> DateTime<Utc> {
        self.job_start + Duration::days(self.config.recommendation_ttl_days)
    }

    /// Load a workload into memory, fetching its document on first touch
    pub async fn workload(
        &mut self,
        identity: &ResourceIdentity,
        store: &dyn RecommendationStore,
    ) -> Result<&mut WorkloadState> {
        if !self.workloads.contains_key(identity) {
            let document = store
                .fetch_or_create(identity)
                .await
                .map_err(|e| RecommenderError::transient("store.fetch_or_create", e))?;
            let state = WorkloadState::rehydrate(document, &self.settings);
            self.workloads.insert(identity.clone(), state);
        }
        self.workloads.get_mut(identity).ok_or_else(|| {
            RecommenderError::transient(
                "store.fetch_or_create",
                anyhow::anyhow!("workload {} missing after load", identity),
            )
        })
    }
}

/// Run `operation` up to `attempts` times while it fails transiently
pub(crate) async fn retry_transient<T, F, Fut>(
    attempts: u32,
    delay: std::time::Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(
                    attempt = attempt,
                    attempts = attempts,
                    error = %e,
                    "Retrying after transient failure"
                );
                attempt += 1;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}
