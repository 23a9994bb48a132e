//! In-memory collaborators
//!
//! Used by tests and by embedders that already hold their inputs in memory.
//! Each one can be told to fail a number of upcoming calls.

use super::{CostQuery, EventChunk, EventSource, RecommendationStore, WorkloadInventory};
use crate::identity::{PodIdentity, ResourceIdentity, WorkloadRef};
use crate::models::{ContainerStateSample, CostSample, WorkloadRecommendation, WorkloadSpecEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Countdown of injected failures
#[derive(Default)]
struct FailureBudget(AtomicUsize);

impl FailureBudget {
    fn set(&self, count: usize) {
        self.0.store(count, Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<()> {
        let remaining = self.0.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("injected failure in {}", operation));
        }
        Ok(())
    }
}

/// Events queued in delivery order
#[derive(Default)]
pub struct VecEventSource {
    specs: Mutex<VecDeque<WorkloadSpecEvent>>,
    states: Mutex<VecDeque<ContainerStateSample>>,
    malformed_states: AtomicUsize,
}

impl VecEventSource {
    pub fn new(specs: Vec<WorkloadSpecEvent>, states: Vec<ContainerStateSample>) -> Self {
        Self {
            specs: Mutex::new(specs.into()),
            states: Mutex::new(states.into()),
            malformed_states: AtomicUsize::new(0),
        }
    }

    /// Report `count` undecodable container states with the next state chunk
    pub fn with_malformed_states(self, count: usize) -> Self {
        self.malformed_states.store(count, Ordering::SeqCst);
        self
    }

    /// Unread spec events and container states
    pub fn pending(&self) -> (usize, usize) {
        let specs = self.specs.lock().map(|q| q.len()).unwrap_or(0);
        let states = self.states.lock().map(|q| q.len()).unwrap_or(0);
        (specs, states)
    }
}

fn take_chunk<T>(queue: &Mutex<VecDeque<T>>, limit: usize) -> Result<Vec<T>> {
    let mut queue = queue.lock().map_err(|_| anyhow!("event queue poisoned"))?;
    let count = limit.min(queue.len());
    Ok(queue.drain(..count).collect())
}

#[async_trait]
impl EventSource for VecEventSource {
    async fn read_workload_specs(&self, limit: usize) -> Result<EventChunk<WorkloadSpecEvent>> {
        take_chunk(&self.specs, limit).map(EventChunk::from)
    }

    async fn read_container_states(
        &self,
        limit: usize,
    ) -> Result<EventChunk<ContainerStateSample>> {
        let items = take_chunk(&self.states, limit)?;
        let malformed = self.malformed_states.swap(0, Ordering::SeqCst);
        Ok(EventChunk::new(items, malformed))
    }
}

/// Pod ownership table that counts its lookups
#[derive(Default)]
pub struct InMemoryInventory {
    owners: Mutex<HashMap<PodIdentity, WorkloadRef>>,
    lookups: AtomicU64,
    failures: FailureBudget,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pod: PodIdentity, name: impl Into<String>, kind: impl Into<String>) {
        if let Ok(mut owners) = self.owners.lock() {
            owners.insert(
                pod,
                WorkloadRef {
                    name: name.into(),
                    kind: kind.into(),
                },
            );
        }
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }
}

#[async_trait]
impl WorkloadInventory for InMemoryInventory {
    async fn lookup(&self, pod: &PodIdentity) -> Result<Option<WorkloadRef>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.failures.check("inventory lookup")?;
        let owners = self.owners.lock().map_err(|_| anyhow!("inventory poisoned"))?;
        Ok(owners.get(pod).cloned())
    }
}

/// Recommendation documents keyed by workload identity
#[derive(Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<ResourceIdentity, WorkloadRecommendation>>,
    saves: AtomicU64,
    failures: FailureBudget,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &ResourceIdentity) -> Option<WorkloadRecommendation> {
        self.documents.lock().ok()?.get(identity).cloned()
    }

    pub fn insert(&self, recommendation: WorkloadRecommendation) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(recommendation.identity.clone(), recommendation);
        }
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }
}

#[async_trait]
impl RecommendationStore for InMemoryStore {
    async fn fetch_or_create(&self, identity: &ResourceIdentity) -> Result<WorkloadRecommendation> {
        self.failures.check("store fetch")?;
        let documents = self.documents.lock().map_err(|_| anyhow!("store poisoned"))?;
        Ok(documents
            .get(identity)
            .cloned()
            .unwrap_or_else(|| WorkloadRecommendation::new(identity.clone())))
    }

    async fn save(&self, recommendation: &WorkloadRecommendation) -> Result<()> {
        self.failures.check("store save")?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut documents = self.documents.lock().map_err(|_| anyhow!("store poisoned"))?;
        documents.insert(recommendation.identity.clone(), recommendation.clone());
        Ok(())
    }
}

/// Fixed per-workload daily costs
#[derive(Default)]
pub struct StaticCostQuery {
    costs: Mutex<HashMap<ResourceIdentity, CostSample>>,
    queries: AtomicU64,
    failures: FailureBudget,
}

impl StaticCostQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: ResourceIdentity, cost: CostSample) {
        if let Ok(mut costs) = self.costs.lock() {
            costs.insert(identity, cost);
        }
    }

    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.set(count);
    }
}

#[async_trait]
impl CostQuery for StaticCostQuery {
    async fn last_available_day_cost(
        &self,
        identity: &ResourceIdentity,
        _lookback_start: DateTime<Utc>,
    ) -> Result<Option<CostSample>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.failures.check("cost query")?;
        let costs = self.costs.lock().map_err(|_| anyhow!("cost table poisoned"))?;
        Ok(costs.get(identity).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_source_chunks_in_order() {
        let now = Utc::now();
        let specs = (0..5)
            .map(|i| WorkloadSpecEvent {
                account_id: "acc".to_string(),
                cluster_id: "cluster".to_string(),
                namespace: "default".to_string(),
                workload_name: format!("web-{}", i),
                workload_kind: "Deployment".to_string(),
                containers: Default::default(),
                timestamp: now,
            })
            .collect();
        let source = VecEventSource::new(specs, Vec::new());

        let first = source.read_workload_specs(3).await.unwrap().items;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].workload_name, "web-0");
        assert_eq!(source.read_workload_specs(3).await.unwrap().items.len(), 2);
        assert!(source.read_workload_specs(3).await.unwrap().is_empty());
        assert!(source.read_container_states(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_fetch_or_create() {
        let store = InMemoryStore::new();
        let identity = ResourceIdentity::new("acc", "cluster", "default", "web", "Deployment");

        let created = store.fetch_or_create(&identity).await.unwrap();
        assert!(created.container_recommendations.is_empty());
        assert!(store.is_empty());

        store.save(&created).await.unwrap();
        assert_eq!(store.len(), 1);

        store.fail_next(1);
        assert!(store.save(&created).await.is_err());
        assert!(store.save(&created).await.is_ok());
        assert_eq!(store.save_count(), 2);
    }
}
