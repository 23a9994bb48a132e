//! File-backed collaborators

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use recommender_lib::sources::{
    CostQuery, EventChunk, EventSource, RecommendationStore, WorkloadInventory,
};
use recommender_lib::{
    ContainerStateSample, CostSample, PodIdentity, ResourceIdentity, WorkloadRecommendation,
    WorkloadRef, WorkloadSpecEvent,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Position in one JSON lines file, opened on first read
struct LineCursor {
    path: PathBuf,
    opened: bool,
    lines: Option<Lines<BufReader<File>>>,
    line_number: usize,
}

impl LineCursor {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            opened: false,
            lines: None,
            line_number: 0,
        }
    }

    /// Undecodable lines are consumed and counted, never returned
    async fn next_chunk<T: DeserializeOwned>(&mut self, limit: usize) -> Result<EventChunk<T>> {
        if !self.opened {
            match File::open(&self.path).await {
                Ok(file) => self.lines = Some(BufReader::new(file).lines()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = ?self.path, "Event file not found, treating as empty");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to open {:?}", self.path));
                }
            }
            self.opened = true;
        }

        let mut items = Vec::new();
        let mut malformed = 0;
        let Some(lines) = self.lines.as_mut() else {
            return Ok(EventChunk::new(items, malformed));
        };

        while items.len() < limit {
            let Some(line) = lines
                .next_line()
                .await
                .with_context(|| format!("Failed to read {:?}", self.path))?
            else {
                break;
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(item) => items.push(item),
                Err(e) => {
                    malformed += 1;
                    warn!(
                        path = ?self.path,
                        line = self.line_number,
                        error = %e,
                        "Skipping malformed event"
                    );
                }
            }
        }
        Ok(EventChunk::new(items, malformed))
    }
}

/// Events read from two JSON lines files in delivery order
pub struct JsonLinesEventSource {
    specs: Mutex<LineCursor>,
    states: Mutex<LineCursor>,
}

impl JsonLinesEventSource {
    pub fn new(workload_specs: &Path, container_states: &Path) -> Self {
        Self {
            specs: Mutex::new(LineCursor::new(workload_specs)),
            states: Mutex::new(LineCursor::new(container_states)),
        }
    }
}

#[async_trait]
impl EventSource for JsonLinesEventSource {
    async fn read_workload_specs(&self, limit: usize) -> Result<EventChunk<WorkloadSpecEvent>> {
        self.specs.lock().await.next_chunk(limit).await
    }

    async fn read_container_states(
        &self,
        limit: usize,
    ) -> Result<EventChunk<ContainerStateSample>> {
        self.states.lock().await.next_chunk(limit).await
    }
}

/// One row of the inventory fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub account_id: String,
    pub cluster_id: String,
    pub namespace: String,
    pub pod_name: String,
    pub workload_name: String,
    pub workload_kind: String,
}

/// Pod ownership loaded from a JSON array of `InventoryEntry`
pub struct JsonInventory {
    owners: HashMap<PodIdentity, WorkloadRef>,
}

impl JsonInventory {
    pub async fn load(path: &Path) -> Result<Self> {
        let entries: Vec<InventoryEntry> = read_json_or_default(path).await?;
        let owners = entries
            .into_iter()
            .map(|e| {
                (
                    PodIdentity::new(e.account_id, e.cluster_id, e.namespace, e.pod_name),
                    WorkloadRef {
                        name: e.workload_name,
                        kind: e.workload_kind,
                    },
                )
            })
            .collect();
        Ok(Self { owners })
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[async_trait]
impl WorkloadInventory for JsonInventory {
    async fn lookup(&self, pod: &PodIdentity) -> Result<Option<WorkloadRef>> {
        Ok(self.owners.get(pod).cloned())
    }
}

/// Billed cost of one workload for one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub account_id: String,
    pub cluster_id: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub day: NaiveDate,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub memory: Option<f64>,
}

/// Daily costs loaded from a JSON array of `CostRecord`
pub struct JsonCostTable {
    days: HashMap<ResourceIdentity, Vec<(NaiveDate, CostSample)>>,
}

impl JsonCostTable {
    pub async fn load(path: &Path) -> Result<Self> {
        let records: Vec<CostRecord> = read_json_or_default(path).await?;
        let mut days: HashMap<ResourceIdentity, Vec<(NaiveDate, CostSample)>> = HashMap::new();
        for record in records {
            let identity = ResourceIdentity::new(
                record.account_id,
                record.cluster_id,
                record.namespace,
                record.name,
                record.kind,
            );
            let cost = CostSample {
                cpu: record.cpu,
                memory: record.memory,
            };
            days.entry(identity).or_default().push((record.day, cost));
        }
        Ok(Self { days })
    }
}

#[async_trait]
impl CostQuery for JsonCostTable {
    async fn last_available_day_cost(
        &self,
        identity: &ResourceIdentity,
        lookback_start: DateTime<Utc>,
    ) -> Result<Option<CostSample>> {
        let first_day = lookback_start.date_naive();
        Ok(self.days.get(identity).and_then(|days| {
            days.iter()
                .filter(|(day, _)| *day >= first_day)
                .max_by_key(|(day, _)| *day)
                .map(|(_, cost)| *cost)
        }))
    }
}

/// One pretty-printed JSON document per workload
pub struct FileRecommendationStore {
    dir: PathBuf,
}

impl FileRecommendationStore {
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create store directory {:?}", dir))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn document_path(&self, identity: &ResourceIdentity) -> PathBuf {
        self.dir.join(document_file_name(identity))
    }

    /// Every document in the store, ordered by identity
    pub async fn list(&self) -> Result<Vec<WorkloadRecommendation>> {
        let mut documents = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list {:?}", self.dir))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {:?}", path))?;
            let document: WorkloadRecommendation = serde_json::from_slice(&data)
                .with_context(|| format!("Failed to parse {:?}", path))?;
            documents.push(document);
        }
        documents.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(documents)
    }
}

#[async_trait]
impl RecommendationStore for FileRecommendationStore {
    async fn fetch_or_create(&self, identity: &ResourceIdentity) -> Result<WorkloadRecommendation> {
        let path = self.document_path(identity);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                let document: WorkloadRecommendation = serde_json::from_slice(&data)
                    .with_context(|| format!("Failed to parse {:?}", path))?;
                if document.identity != *identity {
                    bail!(
                        "Document {:?} belongs to {}, not {}",
                        path,
                        document.identity,
                        identity
                    );
                }
                Ok(document)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(workload = %identity, "Creating new recommendation document");
                Ok(WorkloadRecommendation::new(identity.clone()))
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    async fn save(&self, recommendation: &WorkloadRecommendation) -> Result<()> {
        let path = self.document_path(&recommendation.identity);
        let json = serde_json::to_vec_pretty(recommendation)
            .context("Failed to serialize recommendation")?;

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &json)
            .await
            .with_context(|| format!("Failed to write {:?}", temp_path))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
        Ok(())
    }
}

/// `account+cluster+namespace+kind+name.json` with every part percent-encoded.
///
/// Encoding turns `+` into `%2B`, so the separator never occurs inside a
/// part and distinct identities never share a file.
pub fn document_file_name(identity: &ResourceIdentity) -> String {
    let parts = [
        &identity.account_id,
        &identity.cluster_id,
        &identity.namespace,
        &identity.kind,
        &identity.name,
    ];
    let encoded: Vec<_> = parts.iter().map(|part| urlencoding::encode(part)).collect();
    format!("{}.json", encoded.join("+"))
}

async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(data) => {
            serde_json::from_slice(&data).with_context(|| format!("Failed to parse {:?}", path))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = ?path, "Fixture not found, using an empty table");
            Ok(T::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn web() -> ResourceIdentity {
        ResourceIdentity::new("acc", "prod/eu", "default", "web", "Deployment")
    }

    #[test]
    fn test_document_file_name_is_path_safe() {
        assert_eq!(
            document_file_name(&web()),
            "acc+prod%2Feu+default+Deployment+web.json"
        );
    }

    #[test]
    fn test_document_file_names_are_distinct() {
        let names = [
            web(),
            ResourceIdentity::new("acc", "prod_eu", "default", "web", "Deployment"),
            ResourceIdentity::new("acc", "prod+eu", "default", "web", "Deployment"),
            ResourceIdentity::new("acc", "a__b", "c", "web", "Deployment"),
            ResourceIdentity::new("acc", "a", "b__c", "web", "Deployment"),
            ResourceIdentity::new("acc", "a+b", "c", "web", "Deployment"),
            ResourceIdentity::new("acc", "a", "b+c", "web", "Deployment"),
        ]
        .iter()
        .map(document_file_name)
        .collect::<std::collections::HashSet<_>>();
        assert_eq!(names.len(), 7);
    }

    #[tokio::test]
    async fn test_identities_differing_in_one_character_stay_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecommendationStore::open(dir.path()).await.unwrap();
        let slashed = web();
        let underscored = ResourceIdentity::new("acc", "prod_eu", "default", "web", "Deployment");

        let mut doc = store.fetch_or_create(&slashed).await.unwrap();
        doc.estimated_savings = Some(99.0);
        store.save(&doc).await.unwrap();

        let other = store.fetch_or_create(&underscored).await.unwrap();
        assert_eq!(other.identity, underscored);
        assert_eq!(other.estimated_savings, None);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_rejects_document_of_another_workload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecommendationStore::open(dir.path()).await.unwrap();
        let api = ResourceIdentity::new("acc", "prod/eu", "default", "api", "Deployment");

        let foreign = WorkloadRecommendation::new(api);
        let json = serde_json::to_vec(&foreign).unwrap();
        tokio::fs::write(store.document_path(&web()), json).await.unwrap();

        let err = store.fetch_or_create(&web()).await.unwrap_err();
        assert!(err.to_string().contains("belongs to"));
    }

    #[tokio::test]
    async fn test_store_round_trips_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecommendationStore::open(dir.path()).await.unwrap();

        let fresh = store.fetch_or_create(&web()).await.unwrap();
        assert!(fresh.container_recommendations.is_empty());
        assert!(store.list().await.unwrap().is_empty());

        let mut doc = fresh;
        doc.estimated_savings = Some(12.5);
        store.save(&doc).await.unwrap();

        let loaded = store.fetch_or_create(&web()).await.unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cost_table_picks_latest_day_in_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("costs.json");
        let records = serde_json::json!([
            {"account_id": "acc", "cluster_id": "prod/eu", "namespace": "default",
             "name": "web", "kind": "Deployment", "day": "2024-03-01", "cpu": 1.0},
            {"account_id": "acc", "cluster_id": "prod/eu", "namespace": "default",
             "name": "web", "kind": "Deployment", "day": "2024-03-08", "cpu": 3.0, "memory": 2.0},
            {"account_id": "acc", "cluster_id": "prod/eu", "namespace": "default",
             "name": "web", "kind": "Deployment", "day": "2024-03-05", "cpu": 2.0}
        ]);
        tokio::fs::write(&path, records.to_string()).await.unwrap();
        let table = JsonCostTable::load(&path).await.unwrap();

        let since = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let cost = table.last_available_day_cost(&web(), since).await.unwrap();
        assert_eq!(
            cost,
            Some(CostSample {
                cpu: Some(3.0),
                memory: Some(2.0)
            })
        );

        let too_late = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(
            table.last_available_day_cost(&web(), too_late).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_event_source_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let specs = dir.path().join("specs.jsonl");
        let line = serde_json::json!({
            "account_id": "acc", "cluster_id": "c", "namespace": "default",
            "workload_name": "web", "workload_kind": "Deployment",
            "containers": {"app": {"requests": {"cpu": "1"}}},
            "timestamp": "2024-03-01T00:00:00Z"
        });
        let content = format!("{}\nnot json\n\n{}\n", line, line);
        tokio::fs::write(&specs, content).await.unwrap();

        let source = JsonLinesEventSource::new(&specs, &dir.path().join("missing.jsonl"));
        let first = source.read_workload_specs(1).await.unwrap();
        assert_eq!((first.items.len(), first.malformed), (1, 0));
        let second = source.read_workload_specs(10).await.unwrap();
        assert_eq!((second.items.len(), second.malformed), (1, 1));
        assert!(source.read_workload_specs(10).await.unwrap().is_empty());
        assert!(source.read_container_states(10).await.unwrap().is_empty());
    }
}
