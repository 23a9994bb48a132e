//! Recommendation listing command

use anyhow::Result;
use recommender_lib::quantity::{CPU, MEMORY};
use recommender_lib::WorkloadRecommendation;
use tabled::Tabled;

use crate::output::{print_warning, request, OutputFormat};
use crate::store::{Filter, StoreReader};

/// Row for recommendations table
#[derive(Debug, Tabled)]
pub struct RecommendationRow {
    #[tabled(rename = "Namespace")]
    pub namespace: String,
    #[tabled(rename = "Workload")]
    pub workload: String,
    #[tabled(rename = "Container")]
    pub container: String,
    #[tabled(rename = "CPU Now")]
    pub cpu_current: String,
    #[tabled(rename = "CPU Burst")]
    pub cpu_burstable: String,
    #[tabled(rename = "CPU Guar")]
    pub cpu_guaranteed: String,
    #[tabled(rename = "Mem Now")]
    pub memory_current: String,
    #[tabled(rename = "Mem Burst")]
    pub memory_burstable: String,
    #[tabled(rename = "Mem Guar")]
    pub memory_guaranteed: String,
    #[tabled(rename = "Days")]
    pub num_days: i64,
}

/// One row per container, requests only
pub fn rows(documents: &[WorkloadRecommendation]) -> Vec<RecommendationRow> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.container_recommendations
                .values()
                .map(move |c| RecommendationRow {
                    namespace: doc.identity.namespace.clone(),
                    workload: format!("{}/{}", doc.identity.kind, doc.identity.name),
                    container: c.container_name.clone(),
                    cpu_current: request(c.current.as_ref(), CPU),
                    cpu_burstable: request(c.burstable.as_ref(), CPU),
                    cpu_guaranteed: request(c.guaranteed.as_ref(), CPU),
                    memory_current: request(c.current.as_ref(), MEMORY),
                    memory_burstable: request(c.burstable.as_ref(), MEMORY),
                    memory_guaranteed: request(c.guaranteed.as_ref(), MEMORY),
                    num_days: c.num_days,
                })
        })
        .collect()
}

/// List recommendations with optional filters
pub async fn list_recommendations(
    reader: &StoreReader,
    filter: &Filter,
    valid_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let documents: Vec<_> = reader
        .filtered(filter)
        .await?
        .into_iter()
        .filter(|doc| !valid_only || doc.valid_recommendation)
        .collect();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&documents)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let rows = rows(&documents);
            if rows.is_empty() {
                print_warning("No recommendations found");
                return Ok(());
            }

            let table = tabled::Table::new(&rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!(
                "\nTotal: {} containers in {} workloads",
                rows.len(),
                documents.len()
            );
        }
    }

    Ok(())
}
