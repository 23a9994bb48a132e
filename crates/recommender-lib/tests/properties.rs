//! Property-based tests for the sample merge and savings estimation.
//!
//! Uses proptest to check that the merge and savings laws hold across many
//! generated inputs, not only the fixed cases in the unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use recommender_lib::config::HistogramSettings;
use recommender_lib::histogram::DecayingHistogram;
use recommender_lib::savings::estimate_monthly_savings;
use recommender_lib::state::{accumulate, ContainerUsageState};
use recommender_lib::{
    ContainerRecommendation, ContainerStateSample, CostSample, ResourceRequirement,
};
use std::collections::BTreeMap;

const ACCEPTED: &[u32] = &[1, 2];
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    t0() + Duration::days(60)
}

/// Sample covering `[start_hour, start_hour + hours]` after `t0`
fn sample(
    version: u32,
    start_hour: i64,
    hours: i64,
    cpu_cores: f64,
    memory_peak: f64,
    peak_minute: i64,
) -> ContainerStateSample {
    let settings = HistogramSettings::default();
    let start = t0() + Duration::hours(start_hour);
    let mut cpu = DecayingHistogram::new(settings.cpu, settings.half_life);
    cpu.add_sample(cpu_cores, 1.0, start);
    ContainerStateSample {
        account_id: "acc".to_string(),
        cluster_id: "cluster".to_string(),
        namespace: "default".to_string(),
        pod_name: "web-1".to_string(),
        container_name: "app".to_string(),
        version,
        first_sample_start: start,
        last_sample_start: start + Duration::hours(hours),
        total_samples_count: (hours * 60) as u64,
        cpu_histogram: cpu.save_to_checkpoint(),
        memory_peak,
        memory_peak_time: start + Duration::minutes(peak_minute),
    }
}

/// Merge every sample in order, keeping the state whenever one is rejected
fn fold(samples: &[ContainerStateSample]) -> Option<ContainerUsageState> {
    let settings = HistogramSettings::default();
    samples.iter().fold(None, |state, s| {
        match accumulate(state.as_ref(), s, now(), ACCEPTED, &settings) {
            Ok(next) => Some(next),
            Err(_) => state,
        }
    })
}

fn contiguous_samples(version: u32) -> impl Strategy<Value = Vec<ContainerStateSample>> {
    // (hours, cpu cores, memory peak, peak minute) per sample
    let shapes = prop::collection::vec((1i64..6, 0.01..8.0f64, 1e7..1e11f64, 0i64..300), 1..12);
    shapes.prop_map(move |shapes| {
        let mut start = 0;
        shapes
            .into_iter()
            .map(|(hours, cpu, peak, minute)| {
                let s = sample(version, start, hours, cpu, peak, minute);
                start += hours;
                s
            })
            .collect()
    })
}

fn requirement(resource: &str, quantity: String) -> Option<ResourceRequirement> {
    let mut requests = BTreeMap::new();
    requests.insert(resource.to_string(), quantity);
    Some(ResourceRequirement {
        requests,
        limits: BTreeMap::new(),
    })
}

// ============================================================================
// merge properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Delivering every sample twice ends in the same state as delivering it once.
    #[test]
    fn duplicate_delivery_is_idempotent(samples in contiguous_samples(1)) {
        let once = fold(&samples);
        let twice: Vec<_> = samples.iter().flat_map(|s| [s.clone(), s.clone()]).collect();
        prop_assert_eq!(fold(&twice), once);
    }

    /// Once a newer version is tracked, older-version samples change nothing.
    #[test]
    fn older_version_never_mutates(
        samples in contiguous_samples(2),
        older in prop::collection::vec((0i64..200, 1i64..6, 0.01..8.0f64), 1..8),
    ) {
        let expected = fold(&samples);
        let stale: Vec<_> = older
            .into_iter()
            .map(|(start, hours, cpu)| sample(1, start, hours, cpu, GIB, 0))
            .collect();

        let mut appended = samples.clone();
        appended.extend(stale.iter().cloned());
        prop_assert_eq!(fold(&appended), expected.clone());

        let mut interleaved = Vec::new();
        for (index, newer) in samples.iter().enumerate() {
            interleaved.push(newer.clone());
            if let Some(older) = stale.get(index) {
                interleaved.push(older.clone());
            }
        }
        interleaved.extend(stale.iter().skip(samples.len()).cloned());
        prop_assert_eq!(fold(&interleaved), expected);
    }

    /// Within one window the tracked peak is the window maximum and the
    /// window contributes a single unit of weight.
    #[test]
    fn memory_peak_is_window_maximum(
        peaks in prop::collection::vec((1e7..1e11f64, 0i64..1440), 1..16),
    ) {
        let settings = HistogramSettings::default();
        // anchors the window end at t0
        let anchor = sample(1, 0, 1, 0.5, GIB, 0);
        let mut state = accumulate(None, &anchor, now(), ACCEPTED, &settings).unwrap();

        let (first_peak, _) = peaks[0];
        let mut opener = sample(1, 1, 1, 0.5, first_peak, 0);
        opener.memory_peak_time = t0();
        state = accumulate(Some(&state), &opener, now(), ACCEPTED, &settings).unwrap();
        let window_end = state.memory_window_end();
        prop_assert_eq!(window_end, Some(t0() + Duration::hours(24)));

        let mut expected_max = first_peak;
        for (index, (peak, minute)) in peaks.iter().enumerate().skip(1) {
            let mut s = sample(1, index as i64 + 1, 1, 0.5, *peak, 0);
            s.memory_peak_time = t0() + Duration::minutes(*minute);
            state = accumulate(Some(&state), &s, now(), ACCEPTED, &settings).unwrap();
            expected_max = expected_max.max(*peak);

            prop_assert_eq!(state.memory_window_end(), window_end);
            prop_assert!(state.memory_histogram().total_weight() <= 1.0 + 1e-9);
        }
        prop_assert_eq!(state.memory_tracked_peak(), expected_max);
        prop_assert!((state.memory_histogram().total_weight() - 1.0).abs() < 1e-9);
    }
}

// ============================================================================
// savings properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Savings have the opposite sign of the summed request change.
    #[test]
    fn savings_sign_follows_summed_delta(
        containers in prop::collection::vec((100u32..100_000, 100u32..100_000), 1..5),
        memory in any::<bool>(),
        daily_cost in 0.01..1000.0f64,
    ) {
        let (resource, unit, scale) = if memory {
            ("memory", "Mi", 1024.0 * 1024.0)
        } else {
            ("cpu", "m", 0.001)
        };

        let mut recommendations = BTreeMap::new();
        let mut total_current = 0.0;
        let mut total_delta = 0.0;
        for (index, (current, guaranteed)) in containers.iter().enumerate() {
            let name = format!("c{}", index);
            let mut container = ContainerRecommendation::new(name.clone());
            container.current = requirement(resource, format!("{}{}", current, unit));
            container.guaranteed = requirement(resource, format!("{}{}", guaranteed, unit));
            recommendations.insert(name, container);
            total_current += *current as f64 * scale;
            total_delta += (*guaranteed as f64 - *current as f64) * scale;
        }
        let cost = if memory {
            CostSample { cpu: None, memory: Some(daily_cost) }
        } else {
            CostSample { cpu: Some(daily_cost), memory: None }
        };

        let unrounded = -30.0 * daily_cost * total_delta / total_current;
        // changes that round to zero cents carry no sign
        prop_assume!(unrounded.abs() >= 0.01);

        let savings = estimate_monthly_savings(&recommendations, &cost).unwrap();
        prop_assert_eq!(savings.signum(), -total_delta.signum(),
            "savings {} for delta {}", savings, total_delta);
    }
}
