//! Savings command

use anyhow::Result;
use colored::Colorize;
use recommender_lib::WorkloadRecommendation;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_flag, color_savings, format_currency, format_time, print_info, print_warning,
    OutputFormat,
};
use crate::store::{Filter, StoreReader};

/// Row for savings table
#[derive(Tabled)]
struct SavingsRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Savings/Month")]
    savings: String,
    #[tabled(rename = "Cost Data")]
    cost_available: String,
    #[tabled(rename = "Days")]
    num_days: i64,
    #[tabled(rename = "Computed")]
    computed_at: String,
}

/// Savings totals over a set of workloads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSummary {
    pub workloads: usize,
    /// Workloads contributing an estimate
    pub estimated: usize,
    pub without_cost_data: usize,
    pub total_monthly_savings: f64,
}

pub fn summarize(documents: &[WorkloadRecommendation]) -> SavingsSummary {
    let estimates: Vec<f64> = documents
        .iter()
        .filter_map(|doc| doc.estimated_savings)
        .collect();
    SavingsSummary {
        workloads: documents.len(),
        estimated: estimates.len(),
        without_cost_data: documents
            .iter()
            .filter(|doc| !doc.last_day_cost_available)
            .count(),
        total_monthly_savings: (estimates.iter().sum::<f64>() * 100.0).round() / 100.0,
    }
}

/// Show estimated monthly savings
pub async fn show_savings(
    reader: &StoreReader,
    filter: &Filter,
    format: OutputFormat,
) -> Result<()> {
    let documents = reader.filtered(filter).await?;
    let summary = summarize(&documents);

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if documents.is_empty() {
                print_warning("No workloads found");
                return Ok(());
            }

            println!("{}", "Estimated Savings".bold());
            println!("{}", "=".repeat(50));

            let rows: Vec<SavingsRow> = documents
                .iter()
                .map(|doc| SavingsRow {
                    namespace: doc.identity.namespace.clone(),
                    workload: format!("{}/{}", doc.identity.kind, doc.identity.name),
                    savings: color_savings(doc.estimated_savings),
                    cost_available: color_flag(doc.last_day_cost_available),
                    num_days: doc.num_days,
                    computed_at: format_time(doc.last_computed_recommendation_at),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!();
            println!(
                "Total:                  {}",
                format_currency(summary.total_monthly_savings).green().bold()
            );
            if summary.without_cost_data > 0 {
                print_info(&format!(
                    "{} workloads had no cost data in their last run; their savings may be stale",
                    summary.without_cost_data
                ));
            }
        }
    }

    Ok(())
}
