//! Container state step: merges usage samples and persists recommendations

use super::context::{retry_transient, JobContext, WorkloadState};
use super::runner::{FlushReport, Step};
use crate::error::{RecommenderError, Result};
use crate::estimator::RecommendationComputer;
use crate::identity::{ResourceIdentity, Resolution};
use crate::models::{ContainerStateSample, CostSample};
use crate::savings::estimate_monthly_savings;
use crate::sources::{CostQuery, EventChunk, EventSource, RecommendationStore, WorkloadInventory};
use crate::state::accumulate;
use async_trait::async_trait;
use tracing::{debug, warn};

pub const STEP_NAME: &str = "container_state";

pub struct ContainerStateStep<'a> {
    events: &'a dyn EventSource,
    inventory: &'a dyn WorkloadInventory,
    store: &'a dyn RecommendationStore,
    costs: &'a dyn CostQuery,
    computer: RecommendationComputer,
}

impl<'a> ContainerStateStep<'a> {
    pub fn new(
        events: &'a dyn EventSource,
        inventory: &'a dyn WorkloadInventory,
        store: &'a dyn RecommendationStore,
        costs: &'a dyn CostQuery,
        computer: RecommendationComputer,
    ) -> Self {
        Self {
            events,
            inventory,
            store,
            costs,
            computer,
        }
    }

    /// Daily cost for the lookback window, retried before giving up
    async fn last_day_cost(
        &self,
        ctx: &JobContext,
        identity: &ResourceIdentity,
    ) -> Result<CostSample> {
        let costs = self.costs;
        let lookback_start = ctx.cost_lookback_start();
        let found = retry_transient(
            ctx.config.cost_query_retries,
            ctx.config.retry_delay(),
            move || async move {
                costs
                    .last_available_day_cost(identity, lookback_start)
                    .await
                    .map_err(|e| RecommenderError::transient("cost.last_available_day_cost", e))
            },
        )
        .await;

        match found {
            Ok(Some(cost)) => Ok(cost),
            Ok(None) => Err(RecommenderError::CostUnavailable {
                workload: identity.to_string(),
            }),
            Err(e) => {
                warn!(workload = %identity, error = %e, "Cost query failed, treating as no data");
                Err(RecommenderError::CostUnavailable {
                    workload: identity.to_string(),
                })
            }
        }
    }

    /// Recompute recommendations and savings, then stamp checkpoints and TTL
    async fn finalize(&self, ctx: &JobContext, workload: &mut WorkloadState) {
        let recommendation = &mut workload.recommendation;
        let summary = self
            .computer
            .compute_workload(recommendation, &workload.containers, ctx.job_start);
        debug!(
            workload = %recommendation.identity,
            computed = summary.computed_containers,
            "Recomputed recommendations"
        );

        let identity = recommendation.identity.clone();
        match self.last_day_cost(ctx, &identity).await {
            Ok(cost) => {
                recommendation.last_day_cost_available = true;
                match estimate_monthly_savings(&recommendation.container_recommendations, &cost) {
                    Some(savings) => recommendation.estimated_savings = Some(savings),
                    None => {
                        debug!(workload = %identity, "Savings not computable, keeping previous value")
                    }
                }
            }
            Err(e) => {
                recommendation.last_day_cost_available = false;
                ctx.metrics.inc_cost_unavailable();
                ctx.logger.log_cost_unavailable(&identity.to_string());
                debug!(reason = e.reason(), "Savings left unchanged");
            }
        }

        recommendation.container_checkpoints = workload
            .containers
            .iter()
            .map(|(name, state)| (name.clone(), state.to_checkpoint()))
            .collect();
        recommendation.ttl = Some(ctx.recommendation_ttl());
    }
}

#[async_trait]
impl Step for ContainerStateStep<'_> {
    type Item = ContainerStateSample;

    fn name(&self) -> &'static str {
        STEP_NAME
    }

    async fn read_chunk(&mut self, limit: usize) -> Result<EventChunk<ContainerStateSample>> {
        self.events
            .read_container_states(limit)
            .await
            .map_err(|e| RecommenderError::transient("events.read_container_states", e))
    }

    async fn process(&mut self, ctx: &mut JobContext, sample: &ContainerStateSample) -> Result<()> {
        let pod = sample.pod();
        let lookups_before = ctx.resolver.lookups();
        let resolution = ctx.resolver.resolve(&pod, self.inventory).await;
        let issued = ctx.resolver.lookups() - lookups_before;
        if issued > 0 {
            ctx.metrics.inc_inventory_lookups(issued);
        }

        let identity = match resolution? {
            Resolution::Found(identity) => identity,
            Resolution::NotFound => {
                return Err(RecommenderError::UnresolvedPodMapping {
                    namespace: pod.namespace,
                    pod: pod.name,
                })
            }
        };

        let now = ctx.job_start;
        let settings = ctx.settings;
        let accepted = ctx.config.accepted_sample_versions.clone();
        let workload = ctx.workload(&identity, self.store).await?;

        let next = accumulate(
            workload.containers.get(&sample.container_name),
            sample,
            now,
            &accepted,
            &settings,
        )?;
        workload
            .containers
            .insert(sample.container_name.clone(), next);

        let received = &mut workload.recommendation.last_received_util_data_at;
        if received.map_or(true, |at| at < sample.last_sample_start) {
            *received = Some(sample.last_sample_start);
        }
        Ok(())
    }

    async fn flush(&mut self, ctx: &mut JobContext) -> FlushReport {
        let mut report = FlushReport::default();
        let workloads = std::mem::take(&mut ctx.workloads);
        let attempts = ctx.config.item_retry_limit + 1;
        let delay = ctx.config.retry_delay();
        let store = self.store;

        for (identity, mut workload) in workloads {
            self.finalize(ctx, &mut workload).await;

            let document = &workload.recommendation;
            let saved = retry_transient(attempts, delay, move || async move {
                store
                    .save(document)
                    .await
                    .map_err(|e| RecommenderError::transient("store.save", e))
            })
            .await;

            match saved {
                Ok(()) => {
                    report.saved += 1;
                    ctx.metrics.inc_recommendations_saved();
                    ctx.logger.log_recommendation_saved(
                        &identity.to_string(),
                        document.container_recommendations.len(),
                        document.num_days,
                        document.estimated_savings,
                    );
                }
                Err(e) => {
                    warn!(workload = %identity, error = %e, "Failed to save recommendation");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
