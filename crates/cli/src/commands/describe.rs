//! Detailed view of a single workload

use anyhow::{bail, Result};
use colored::Colorize;
use recommender_lib::{ContainerRecommendation, ResourceMap};
use std::collections::BTreeSet;
use tabled::Tabled;

use crate::output::{color_flag, color_savings, format_time, limit, request, OutputFormat};
use crate::store::StoreReader;

/// Row for the per-resource table of one container
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Current Req")]
    current_request: String,
    #[tabled(rename = "Current Lim")]
    current_limit: String,
    #[tabled(rename = "Burstable Req")]
    burstable_request: String,
    #[tabled(rename = "Burstable Lim")]
    burstable_limit: String,
    #[tabled(rename = "Guaranteed Req")]
    guaranteed_request: String,
    #[tabled(rename = "Guaranteed Lim")]
    guaranteed_limit: String,
}

fn resource_names(container: &ContainerRecommendation) -> BTreeSet<String> {
    let requirements = [
        &container.current,
        &container.burstable,
        &container.guaranteed,
    ];
    let maps: Vec<&ResourceMap> = requirements
        .into_iter()
        .flatten()
        .flat_map(|r| [&r.requests, &r.limits])
        .collect();
    maps.into_iter().flat_map(|m| m.keys().cloned()).collect()
}

fn resource_rows(container: &ContainerRecommendation) -> Vec<ResourceRow> {
    resource_names(container)
        .into_iter()
        .map(|resource| ResourceRow {
            current_request: request(container.current.as_ref(), &resource),
            current_limit: limit(container.current.as_ref(), &resource),
            burstable_request: request(container.burstable.as_ref(), &resource),
            burstable_limit: limit(container.burstable.as_ref(), &resource),
            guaranteed_request: request(container.guaranteed.as_ref(), &resource),
            guaranteed_limit: limit(container.guaranteed.as_ref(), &resource),
            resource,
        })
        .collect()
}

/// Show every resource of one workload
pub async fn describe_workload(
    reader: &StoreReader,
    workload: &str,
    kind: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let Some((namespace, name)) = workload.split_once('/') else {
        bail!("Workload must be given as namespace/name, got {:?}", workload);
    };

    let matches: Vec<_> = reader
        .list()
        .await?
        .into_iter()
        .filter(|doc| doc.identity.namespace == namespace && doc.identity.name == name)
        .filter(|doc| kind.map(|k| doc.identity.kind == k).unwrap_or(true))
        .collect();

    let doc = match matches.as_slice() {
        [] => bail!("No recommendation found for {}", workload),
        [doc] => doc,
        _ => bail!(
            "{} workloads named {}; pass --kind to choose one",
            matches.len(),
            workload
        ),
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(doc)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Workload Recommendation".bold());
            println!("{}", "=".repeat(60));
            println!("Workload:        {}", doc.identity.to_string().cyan());
            println!("Valid:           {}", color_flag(doc.valid_recommendation));
            println!("Days of data:    {}", doc.num_days);
            println!("Samples:         {}", doc.total_samples_count);
            println!("Monthly savings: {}", color_savings(doc.estimated_savings));
            println!("Cost data:       {}", color_flag(doc.last_day_cost_available));
            println!("Last data:       {}", format_time(doc.last_received_util_data_at));
            println!("Computed:        {}", format_time(doc.last_computed_recommendation_at));
            println!("Expires:         {}", format_time(doc.ttl));
            if doc.dirty {
                println!("{}", "Declared resources changed since last computation".yellow());
            }

            for container in doc.container_recommendations.values() {
                println!();
                println!(
                    "{} {} ({} days, {} samples)",
                    "Container".bold(),
                    container.container_name.cyan(),
                    container.num_days,
                    container.total_samples_count
                );
                let table = tabled::Table::new(resource_rows(container))
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recommender_lib::ResourceRequirement;

    #[test]
    fn test_rows_cover_every_resource() {
        let mut container = ContainerRecommendation::new("app");
        let mut current = ResourceRequirement::default();
        current.requests.insert("cpu".to_string(), "1".to_string());
        current
            .limits
            .insert("nvidia.com/gpu".to_string(), "1".to_string());
        container.current = Some(current);
        let mut guaranteed = ResourceRequirement::default();
        guaranteed
            .requests
            .insert("memory".to_string(), "300Mi".to_string());
        container.guaranteed = Some(guaranteed);

        let rows = resource_rows(&container);
        let names: Vec<_> = rows.iter().map(|r| r.resource.as_str()).collect();
        assert_eq!(names, vec!["cpu", "memory", "nvidia.com/gpu"]);
        assert_eq!(rows[1].guaranteed_request, "300Mi");
        assert_eq!(rows[1].current_request, "-");
    }
}
