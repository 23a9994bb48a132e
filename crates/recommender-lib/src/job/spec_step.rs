//! Workload spec step: records each container's declared resources

use super::context::{retry_transient, JobContext};
use super::runner::{FlushReport, Step};
use crate::error::{RecommenderError, Result};
use crate::models::{ContainerSpec, ResourceMap, ResourceRequirement, WorkloadSpecEvent};
use crate::quantity::parse_quantity;
use crate::sources::{EventChunk, EventSource, RecommendationStore};
use async_trait::async_trait;
use tracing::{debug, warn};

pub const STEP_NAME: &str = "workload_spec";

pub struct WorkloadSpecStep<'a> {
    events: &'a dyn EventSource,
    store: &'a dyn RecommendationStore,
}

impl<'a> WorkloadSpecStep<'a> {
    pub fn new(events: &'a dyn EventSource, store: &'a dyn RecommendationStore) -> Self {
        Self { events, store }
    }
}

/// Validated copy of a declared resource map, blank entries dropped
fn sanitize(resources: &ResourceMap) -> Result<ResourceMap> {
    let mut sanitized = ResourceMap::new();
    for (resource, quantity) in resources {
        let resource = resource.trim();
        let quantity = quantity.trim();
        if resource.is_empty() || quantity.is_empty() {
            continue;
        }
        parse_quantity(resource, quantity)?;
        sanitized.insert(resource.to_string(), quantity.to_string());
    }
    Ok(sanitized)
}

/// Declared requirement of one container
///
/// Limits fill the requests a container leaves undeclared, since the
/// scheduler defaults a missing request to its limit.
pub fn build_current(spec: &ContainerSpec) -> Result<ResourceRequirement> {
    let mut requests = sanitize(&spec.requests)?;
    let limits = sanitize(&spec.limits)?;
    for (resource, quantity) in &limits {
        requests
            .entry(resource.clone())
            .or_insert_with(|| quantity.clone());
    }
    Ok(ResourceRequirement { requests, limits })
}

#[async_trait]
impl Step for WorkloadSpecStep<'_> {
    type Item = WorkloadSpecEvent;

    fn name(&self) -> &'static str {
        STEP_NAME
    }

    async fn read_chunk(&mut self, limit: usize) -> Result<EventChunk<WorkloadSpecEvent>> {
        self.events
            .read_workload_specs(limit)
            .await
            .map_err(|e| RecommenderError::transient("events.read_workload_specs", e))
    }

    async fn process(&mut self, ctx: &mut JobContext, event: &WorkloadSpecEvent) -> Result<()> {
        // validate everything before touching the workload
        let mut declared = Vec::with_capacity(event.containers.len());
        for (name, spec) in &event.containers {
            declared.push((name, build_current(spec)?));
        }

        let identity = event.identity();
        let workload = ctx.workload(&identity, self.store).await?;
        for (name, current) in declared {
            let container = workload.recommendation.container_mut(name);
            if container.current.as_ref() != Some(&current) {
                debug!(workload = %identity, container = %name, "Declared resources changed");
                container.current = Some(current);
                workload.recommendation.dirty = true;
            }
        }
        Ok(())
    }

    async fn flush(&mut self, ctx: &mut JobContext) -> FlushReport {
        let mut report = FlushReport::default();
        let workloads = std::mem::take(&mut ctx.workloads);
        let attempts = ctx.config.item_retry_limit + 1;
        let delay = ctx.config.retry_delay();

        let store = self.store;

        for (identity, workload) in workloads {
            let document = &workload.recommendation;
            let saved = retry_transient(attempts, delay, move || async move {
                store
                    .save(document)
                    .await
                    .map_err(|e| RecommenderError::transient("store.save", e))
            })
            .await;
            match saved {
                Ok(()) => report.saved += 1,
                Err(e) => {
                    warn!(workload = %identity, error = %e, "Failed to save declared resources");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(entries: &[(&str, &str)]) -> ResourceMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_limits_fill_missing_requests() {
        let spec = ContainerSpec {
            requests: BTreeMap::new(),
            limits: map(&[("cpu", "1"), ("memory", "1Gi")]),
        };
        let current = build_current(&spec).unwrap();
        assert_eq!(current.requests, map(&[("cpu", "1"), ("memory", "1Gi")]));
        assert_eq!(current.limits, map(&[("cpu", "1"), ("memory", "1Gi")]));
    }

    #[test]
    fn test_requests_win_over_limits() {
        let spec = ContainerSpec {
            requests: map(&[("cpu", "250m")]),
            limits: map(&[("cpu", "1"), ("nvidia.com/gpu", "1")]),
        };
        let current = build_current(&spec).unwrap();
        assert_eq!(current.request("cpu"), Some("250m"));
        assert_eq!(current.request("nvidia.com/gpu"), Some("1"));
    }

    #[test]
    fn test_malformed_quantity_rejects_container() {
        let spec = ContainerSpec {
            requests: map(&[("memory", "lots")]),
            limits: BTreeMap::new(),
        };
        let err = build_current(&spec).unwrap_err();
        assert_eq!(err.reason(), "malformed_quantity");
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let spec = ContainerSpec {
            requests: map(&[("cpu", " "), ("memory", "512Mi")]),
            limits: BTreeMap::new(),
        };
        let current = build_current(&spec).unwrap();
        assert_eq!(current.requests, map(&[("memory", "512Mi")]));
    }
}
