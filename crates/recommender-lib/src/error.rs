//! Error taxonomy for the recommendation engine
//!
//! None of these errors reach a user directly. Each one is either skipped
//! and counted by the step runner or surfaces as a failed step.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Debug, Error)]
pub enum RecommenderError {
    /// Sample schema version is not in the accepted set
    #[error("unsupported container state version {version}")]
    SchemaIncompatible { version: u32 },

    /// Sample interval is already covered by the tracked state
    #[error("stale or duplicate sample for container {container}")]
    StaleOrDuplicateSample { container: String },

    /// No workload owns the pod in the inventory
    #[error("no workload found for pod {namespace}/{pod}")]
    UnresolvedPodMapping { namespace: String, pod: String },

    /// Billing data missing for the lookback window
    #[error("no cost data available for {workload}")]
    CostUnavailable { workload: String },

    /// Store or query collaborator failed; may succeed on retry
    #[error("transient failure in {operation}: {source}")]
    Transient {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Events the source could not decode
    #[error("{count} malformed events from {source_name}")]
    MalformedEvent {
        source_name: &'static str,
        count: usize,
    },

    #[error("malformed quantity {value:?} for resource {resource}")]
    MalformedQuantity { resource: String, value: String },

    #[error("histogram options mismatch: {0}")]
    IncompatibleHistogram(String),

    /// Step skip budget exhausted
    #[error("step {step} exceeded skip limit of {limit}")]
    SkipLimitExceeded { step: &'static str, limit: usize },
}

impl RecommenderError {
    pub fn transient(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Transient { operation, source }
    }

    /// Returns true if the failed operation is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Short label used for skip counters and log fields
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SchemaIncompatible { .. } => "schema_incompatible",
            Self::StaleOrDuplicateSample { .. } => "stale_or_duplicate",
            Self::UnresolvedPodMapping { .. } => "unresolved_pod",
            Self::CostUnavailable { .. } => "cost_unavailable",
            Self::Transient { .. } => "transient",
            Self::MalformedEvent { .. } => "malformed_event",
            Self::MalformedQuantity { .. } => "malformed_quantity",
            Self::IncompatibleHistogram(_) => "incompatible_histogram",
            Self::SkipLimitExceeded { .. } => "skip_limit_exceeded",
        }
    }
}
