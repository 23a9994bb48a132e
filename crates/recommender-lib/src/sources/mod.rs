//! Collaborator contracts consumed by the recommendation job
//!
//! The engine never talks to a message bus, an inventory service, a
//! database or a billing backend directly. It only sees these traits.

pub mod memory;

use crate::identity::{PodIdentity, ResourceIdentity, WorkloadRef};
use crate::models::{ContainerStateSample, CostSample, WorkloadRecommendation, WorkloadSpecEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Events read in one call, plus the number of undecodable events consumed
#[derive(Debug, Clone, PartialEq)]
pub struct EventChunk<T> {
    pub items: Vec<T>,
    pub malformed: usize,
}

impl<T> EventChunk<T> {
    pub fn new(items: Vec<T>, malformed: usize) -> Self {
        Self { items, malformed }
    }

    /// Nothing was consumed, the stream is exhausted
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.malformed == 0
    }
}

impl<T> From<Vec<T>> for EventChunk<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items, 0)
    }
}

/// Finite stream of typed events for one account and time window.
/// An empty chunk means the stream is exhausted.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn read_workload_specs(&self, limit: usize) -> Result<EventChunk<WorkloadSpecEvent>>;

    async fn read_container_states(
        &self,
        limit: usize,
    ) -> Result<EventChunk<ContainerStateSample>>;
}

/// Pod ownership lookup
#[async_trait]
pub trait WorkloadInventory: Send + Sync {
    async fn lookup(&self, pod: &PodIdentity) -> Result<Option<WorkloadRef>>;
}

/// Persistence of workload recommendations
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn fetch_or_create(&self, identity: &ResourceIdentity) -> Result<WorkloadRecommendation>;

    /// Insert or replace the document for `recommendation.identity`
    async fn save(&self, recommendation: &WorkloadRecommendation) -> Result<()>;
}

/// Billing cost lookup, figures truncated to day boundaries
#[async_trait]
pub trait CostQuery: Send + Sync {
    async fn last_available_day_cost(
        &self,
        identity: &ResourceIdentity,
        lookback_start: DateTime<Utc>,
    ) -> Result<Option<CostSample>>;
}
