//! Read access to the recommendation store directory

use anyhow::{Context, Result};
use clap::Args;
use recommender_lib::WorkloadRecommendation;
use std::path::{Path, PathBuf};

use crate::output::print_warning;

/// Workload selection shared by the listing commands
#[derive(Debug, Clone, Default, Args)]
pub struct Filter {
    /// Filter by namespace
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Filter by workload name (substring match)
    #[arg(long, short)]
    pub workload: Option<String>,

    /// Filter by cluster
    #[arg(long)]
    pub cluster: Option<String>,
}

impl Filter {
    pub fn matches(&self, doc: &WorkloadRecommendation) -> bool {
        let identity = &doc.identity;
        self.namespace
            .as_ref()
            .map(|ns| identity.namespace == *ns)
            .unwrap_or(true)
            && self
                .workload
                .as_ref()
                .map(|w| identity.name.contains(w.as_str()))
                .unwrap_or(true)
            && self
                .cluster
                .as_ref()
                .map(|c| identity.cluster_id == *c)
                .unwrap_or(true)
    }
}

/// Reader over the one-document-per-workload store
pub struct StoreReader {
    dir: PathBuf,
    verbose: bool,
}

impl StoreReader {
    pub fn new(dir: &Path, verbose: bool) -> Self {
        Self {
            dir: dir.to_path_buf(),
            verbose,
        }
    }

    /// All readable documents, ordered by identity
    pub async fn list(&self) -> Result<Vec<WorkloadRecommendation>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to open store directory {:?}", self.dir))?;

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {:?}", path))?;
            match serde_json::from_slice::<WorkloadRecommendation>(&data) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    if self.verbose {
                        print_warning(&format!("Skipping {:?}: {}", path, e));
                    }
                }
            }
        }

        documents.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(documents)
    }

    pub async fn filtered(&self, filter: &Filter) -> Result<Vec<WorkloadRecommendation>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recommender_lib::ResourceIdentity;

    fn doc(namespace: &str, name: &str) -> WorkloadRecommendation {
        WorkloadRecommendation::new(ResourceIdentity::new(
            "acc",
            "prod",
            namespace,
            name,
            "Deployment",
        ))
    }

    #[test]
    fn test_filter_matches() {
        let filter = Filter {
            namespace: Some("shop".to_string()),
            workload: Some("check".to_string()),
            cluster: None,
        };
        assert!(filter.matches(&doc("shop", "checkout")));
        assert!(!filter.matches(&doc("shop", "cart")));
        assert!(!filter.matches(&doc("default", "checkout")));
        assert!(Filter::default().matches(&doc("default", "cart")));
    }

    #[tokio::test]
    async fn test_list_skips_foreign_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = doc("shop", "checkout");
        std::fs::write(
            dir.path().join("good.json"),
            serde_json::to_vec(&good).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let reader = StoreReader::new(dir.path(), false);
        let docs = reader.list().await.unwrap();
        assert_eq!(docs, vec![good]);
    }

    #[tokio::test]
    async fn test_missing_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader = StoreReader::new(&dir.path().join("absent"), false);
        assert!(reader.list().await.is_err());
    }
}
