//! Recommendation job
//!
//! A job runs two chunked steps for one account:
//! - the workload spec step records the declared resources of each container
//! - the container state step merges usage samples, recomputes
//!   recommendations and savings and persists each touched workload
//!
//! The state step only runs once the spec step has completed.

mod context;
mod runner;
mod spec_step;
mod state_step;


pub use context::{JobContext, WorkloadState};
pub use runner::{FlushReport, Step, StepReport, StepRunner};
pub use spec_step::{build_current, WorkloadSpecStep};
pub use state_step::ContainerStateStep;

use crate::error::Result;
use crate::estimator::RecommendationComputer;
use crate::sources::{CostQuery, EventSource, RecommendationStore, WorkloadInventory};
use std::time::Instant;

/// External systems one job run talks to
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub events: &'a dyn EventSource,
    pub inventory: &'a dyn WorkloadInventory,
    pub store: &'a dyn RecommendationStore,
    pub costs: &'a dyn CostQuery,
}

/// Outcome of a completed job
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub workload_spec: StepReport,
    pub container_state: StepReport,
    pub inventory_lookups: u64,
    pub elapsed_secs: f64,
}

impl JobReport {
    pub fn saved(&self) -> usize {
        self.workload_spec.flushed + self.container_state.flushed
    }
}

/// Run both steps in order
///
/// A failed spec step stops the job before any usage sample is read.
pub async fn run_job(ctx: &mut JobContext, collaborators: Collaborators<'_>) -> Result<JobReport> {
    let started = Instant::now();
    let runner = StepRunner::from_config(&ctx.config);
    ctx.logger.log_job_started(&ctx.job_start.to_rfc3339());

    let mut spec_step = WorkloadSpecStep::new(collaborators.events, collaborators.store);
    let workload_spec = match runner.run(&mut spec_step, ctx).await {
        Ok(report) => report,
        Err(e) => {
            ctx.logger.log_job_finished(false, 0);
            return Err(e);
        }
    };

    let mut state_step = ContainerStateStep::new(
        collaborators.events,
        collaborators.inventory,
        collaborators.store,
        collaborators.costs,
        RecommendationComputer::from_config(&ctx.config),
    );
    let container_state = match runner.run(&mut state_step, ctx).await {
        Ok(report) => report,
        Err(e) => {
            ctx.logger.log_job_finished(false, workload_spec.flushed);
            return Err(e);
        }
    };

    let report = JobReport {
        workload_spec,
        container_state,
        inventory_lookups: ctx.resolver.lookups(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    };
    ctx.logger.log_job_finished(true, report.saved());
    Ok(report)
}
