//! Workload recommender batch runner
//!
//! Wires file-backed collaborators into one recommendation job:
//! - JSON lines event files for spec changes and container usage
//! - JSON inventory and billing cost fixtures
//! - One JSON document per workload in a store directory

pub mod config;
pub mod files;

pub use config::RunnerConfig;
pub use files::{FileRecommendationStore, JsonCostTable, JsonInventory, JsonLinesEventSource};

use anyhow::{Context, Result};
use recommender_lib::{run_job, Collaborators, JobContext, JobReport};

/// Run one job for the configured account against the configured files
pub async fn run(config: &RunnerConfig) -> Result<JobReport> {
    let events = JsonLinesEventSource::new(
        &config.workload_specs_path,
        &config.container_states_path,
    );
    let inventory = JsonInventory::load(&config.inventory_path)
        .await
        .context("Failed to load pod inventory")?;
    let costs = JsonCostTable::load(&config.costs_path)
        .await
        .context("Failed to load cost table")?;
    let store = FileRecommendationStore::open(&config.store_dir)
        .await
        .context("Failed to open recommendation store")?;

    let mut ctx = JobContext::new(&config.account_id, config.job.clone(), config.job_start());
    let report = run_job(
        &mut ctx,
        Collaborators {
            events: &events,
            inventory: &inventory,
            store: &store,
            costs: &costs,
        },
    )
    .await
    .with_context(|| format!("Recommendation job failed for account {}", config.account_id))?;

    Ok(report)
}
