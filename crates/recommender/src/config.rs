//! Runner configuration

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use recommender_lib::JobConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file used when `RECOMMENDER_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "recommender.toml";

/// Runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Account whose events this run processes
    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default = "default_workload_specs_path")]
    pub workload_specs_path: PathBuf,

    #[serde(default = "default_container_states_path")]
    pub container_states_path: PathBuf,

    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,

    #[serde(default = "default_costs_path")]
    pub costs_path: PathBuf,

    /// Directory holding one JSON document per workload
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Overrides the job clock, mostly for replaying old windows
    #[serde(default)]
    pub job_start: Option<DateTime<Utc>>,

    /// Print the Prometheus text exposition when the run ends
    #[serde(default)]
    pub metrics_dump: bool,

    #[serde(default)]
    pub job: JobConfig,
}

fn default_account_id() -> String {
    "default".to_string()
}

fn default_workload_specs_path() -> PathBuf {
    PathBuf::from("data/workload_specs.jsonl")
}

fn default_container_states_path() -> PathBuf {
    PathBuf::from("data/container_states.jsonl")
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("data/inventory.json")
}

fn default_costs_path() -> PathBuf {
    PathBuf::from("data/costs.json")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data/recommendations")
}

impl RunnerConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("RECOMMENDER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Environment variables (`RECOMMENDER__JOB__CHUNK_SIZE=500`) override the file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("RECOMMENDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn job_start(&self) -> DateTime<Utc> {
        self.job_start.unwrap_or_else(Utc::now)
    }
}
