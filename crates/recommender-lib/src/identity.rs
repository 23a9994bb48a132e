//! Workload identities and pod-to-workload resolution
//!
//! Usage samples arrive per pod while recommendations are kept per
//! workload. The resolver translates between the two through a bounded
//! LRU cache in front of the inventory collaborator.

use crate::error::{RecommenderError, Result};
use crate::sources::WorkloadInventory;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// Default number of pods remembered by the resolver
pub const DEFAULT_POD_CACHE_CAPACITY: usize = 10_000;

/// Identity of a workload (deployment, statefulset, ...) in a cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub account_id: String,
    pub cluster_id: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

impl ResourceIdentity {
    pub fn new(
        account_id: impl Into<String>,
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.account_id, self.cluster_id, self.namespace, self.kind, self.name
        )
    }
}

/// Identity of a single pod, as reported by usage samples
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodIdentity {
    pub account_id: String,
    pub cluster_id: String,
    pub namespace: String,
    pub name: String,
}

impl PodIdentity {
    pub fn new(
        account_id: impl Into<String>,
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the owning workload's identity from an inventory answer
    pub fn workload(&self, owner: &WorkloadRef) -> ResourceIdentity {
        ResourceIdentity::new(
            &self.account_id,
            &self.cluster_id,
            &self.namespace,
            &owner.name,
            &owner.kind,
        )
    }
}

/// Owner of a pod as known to the inventory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub name: String,
    pub kind: String,
}

/// Outcome of a pod lookup. Negative results are cached like positive ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    Found(ResourceIdentity),
    NotFound,
}

impl Resolution {
    pub fn found(&self) -> Option<&ResourceIdentity> {
        match self {
            Resolution::Found(identity) => Some(identity),
            Resolution::NotFound => None,
        }
    }
}

/// Bounded cache translating pods into the workloads owning them
pub struct PodWorkloadResolver {
    cache: LruCache<PodIdentity, Resolution>,
    lookups: u64,
}

impl PodWorkloadResolver {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            lookups: 0,
        }
    }

    /// Resolve a pod, querying the inventory only on a cache miss
    pub async fn resolve(
        &mut self,
        pod: &PodIdentity,
        inventory: &dyn WorkloadInventory,
    ) -> Result<Resolution> {
        if let Some(cached) = self.cache.get(pod) {
            return Ok(cached.clone());
        }

        self.lookups += 1;
        let owner = inventory
            .lookup(pod)
            .await
            .map_err(|e| RecommenderError::transient("inventory.lookup", e))?;

        let resolution = match owner {
            Some(owner) => {
                let identity = pod.workload(&owner);
                debug!(pod = %pod.name, workload = %identity, "Resolved pod owner");
                Resolution::Found(identity)
            }
            None => {
                warn!(
                    cluster_id = %pod.cluster_id,
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    "No workload found for pod"
                );
                Resolution::NotFound
            }
        };

        self.cache.put(pod.clone(), resolution.clone());
        Ok(resolution)
    }

    /// Number of inventory lookups issued so far
    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for PodWorkloadResolver {
    fn default() -> Self {
        Self::new(DEFAULT_POD_CACHE_CAPACITY)
    }
}
