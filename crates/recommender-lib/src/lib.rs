//! Workload resource recommendation engine
//!
//! This crate provides the core functionality for:
//! - Resolving pods to the workloads that own them
//! - Tracking per-container usage in decaying histograms
//! - Computing burstable and guaranteed resource recommendations
//! - Estimating monthly savings against observed billing cost
//! - Running the chunked ingestion steps of a recommendation job

pub mod config;
pub mod error;
pub mod estimator;
pub mod histogram;
pub mod identity;
pub mod job;
pub mod models;
pub mod observability;
pub mod quantity;
pub mod savings;
pub mod sources;
pub mod state;

pub use config::{JobConfig, PolicyConfig};
pub use error::{RecommenderError, Result};
pub use identity::{PodIdentity, PodWorkloadResolver, Resolution, ResourceIdentity, WorkloadRef};
pub use models::*;
pub use observability::{JobMetrics, StructuredLogger};
pub use job::{run_job, Collaborators, JobContext, JobReport, StepReport};
