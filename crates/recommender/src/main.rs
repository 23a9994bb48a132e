//! Workload Recommender - batch job computing resource recommendations
//!
//! Runs the workload spec step and the container state step once for a
//! single account, then exits. Scheduling is left to the cluster's job
//! runner.

use anyhow::Result;
use prometheus::{Encoder, TextEncoder};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workload_recommender::RunnerConfig;

const RECOMMENDER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = RECOMMENDER_VERSION, "Starting workload-recommender");

    let config = RunnerConfig::load()?;
    info!(
        account_id = %config.account_id,
        store_dir = ?config.store_dir,
        "Recommender configured"
    );

    let outcome = workload_recommender::run(&config).await;

    if config.metrics_dump {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        print!("{}", String::from_utf8_lossy(&buffer));
    }

    let report = outcome?;
    info!(
        specs_read = report.workload_spec.read,
        states_read = report.container_state.read,
        skipped = report.workload_spec.skipped + report.container_state.skipped,
        saved = report.saved(),
        elapsed_secs = report.elapsed_secs,
        "Run complete"
    );

    Ok(())
}
