//! Monthly savings estimation
//!
//! Savings compare each container's guaranteed recommendation with its
//! current requests and scale the relative change by the workload's last
//! observed daily cost. Raising requests yields negative savings.

use crate::models::{ContainerRecommendation, CostSample};
use crate::quantity::{parse_quantity, CPU, MEMORY};
use std::collections::BTreeMap;

const DAYS_PER_MONTH: f64 = 30.0;

/// Relative change of `resource` across containers, or `None` if incomputable
///
/// Only containers with both a current and a guaranteed request for the
/// resource count.
pub fn resource_change_percent(
    containers: &BTreeMap<String, ContainerRecommendation>,
    resource: &str,
) -> Option<f64> {
    let mut total_change = 0.0;
    let mut total_current = 0.0;
    let mut qualifying = 0usize;

    for container in containers.values() {
        let current = container
            .current
            .as_ref()
            .and_then(|c| c.request(resource))
            .and_then(|q| parse_quantity(resource, q).ok());
        let recommended = container
            .guaranteed
            .as_ref()
            .and_then(|g| g.request(resource))
            .and_then(|q| parse_quantity(resource, q).ok());

        if let (Some(current), Some(recommended)) = (current, recommended) {
            total_change += recommended - current;
            total_current += current;
            qualifying += 1;
        }
    }

    if qualifying == 0 || total_current == 0.0 {
        return None;
    }
    Some(total_change / total_current)
}

/// Estimated monthly savings rounded to cents, or `None` if incomputable
pub fn estimate_monthly_savings(
    containers: &BTreeMap<String, ContainerRecommendation>,
    last_day_cost: &CostSample,
) -> Option<f64> {
    let terms: Vec<f64> = [CPU, MEMORY]
        .iter()
        .filter_map(|resource| {
            let change = resource_change_percent(containers, resource)?;
            let cost = last_day_cost.for_resource(resource)?;
            Some(change * cost)
        })
        .collect();

    if terms.is_empty() {
        return None;
    }
    let cost_change_for_day: f64 = terms.iter().sum();
    Some(round_half_up(cost_change_for_day * -DAYS_PER_MONTH, 2))
}

/// Round to `places` decimals, halves away from zero
pub fn round_half_up(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    let scaled = value * scale;
    // absorb binary representation error before deciding the half
    let nudged = scaled + scaled.signum() * 1e-9;
    nudged.round() / scale
}
