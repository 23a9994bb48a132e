//! Usage state of a single container and the sample merge

use crate::config::HistogramSettings;
use crate::error::{RecommenderError, Result};
use crate::histogram::DecayingHistogram;
use crate::models::ContainerStateSample;
use chrono::{DateTime, Duration, Utc};

/// Decaying cpu histogram plus a memory histogram fed one peak per window
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerUsageState {
    pub(super) version: u32,
    pub(super) first_sample_start: DateTime<Utc>,
    pub(super) last_sample_start: DateTime<Utc>,
    pub(super) last_update_time: DateTime<Utc>,
    pub(super) total_samples_count: u64,
    pub(super) cpu_histogram: DecayingHistogram,
    pub(super) memory_histogram: DecayingHistogram,
    pub(super) memory_window_end: Option<DateTime<Utc>>,
    pub(super) memory_tracked_peak: f64,
}

impl ContainerUsageState {
    fn fresh(sample: &ContainerStateSample, settings: &HistogramSettings) -> Self {
        Self {
            version: sample.version,
            first_sample_start: sample.first_sample_start,
            last_sample_start: sample.first_sample_start,
            last_update_time: sample.first_sample_start,
            total_samples_count: 0,
            cpu_histogram: DecayingHistogram::new(settings.cpu, settings.half_life),
            memory_histogram: DecayingHistogram::new(settings.memory, settings.half_life),
            memory_window_end: None,
            memory_tracked_peak: 0.0,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn first_sample_start(&self) -> DateTime<Utc> {
        self.first_sample_start
    }

    pub fn last_sample_start(&self) -> DateTime<Utc> {
        self.last_sample_start
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update_time
    }

    pub fn total_samples_count(&self) -> u64 {
        self.total_samples_count
    }

    pub fn cpu_histogram(&self) -> &DecayingHistogram {
        &self.cpu_histogram
    }

    pub fn memory_histogram(&self) -> &DecayingHistogram {
        &self.memory_histogram
    }

    pub fn memory_window_end(&self) -> Option<DateTime<Utc>> {
        self.memory_window_end
    }

    pub fn memory_tracked_peak(&self) -> f64 {
        self.memory_tracked_peak
    }

    /// Whole days between the first and the last sample interval
    pub fn num_days(&self) -> i64 {
        (self.last_sample_start - self.first_sample_start).num_days()
    }

    fn record_memory_peak(&mut self, value: f64, time: DateTime<Utc>, interval: Duration) {
        let window_end = match self.memory_window_end {
            None => {
                // The first peak only anchors the window.
                self.memory_window_end = Some(time);
                return;
            }
            Some(end) => end,
        };

        if time < window_end {
            if value > self.memory_tracked_peak && self.memory_tracked_peak != 0.0 {
                self.memory_histogram
                    .subtract_sample(self.memory_tracked_peak, 1.0, window_end);
                self.memory_histogram.add_sample(value, 1.0, window_end);
                self.memory_tracked_peak = value;
            }
            return;
        }

        let step = interval.num_milliseconds().max(1);
        let behind = (time - window_end).num_milliseconds();
        let windows = (behind + step - 1) / step;
        let new_end = window_end + Duration::milliseconds(windows * step + step);

        self.memory_window_end = Some(new_end);
        self.memory_tracked_peak = 0.0;
        self.memory_histogram.add_sample(value, 1.0, new_end);
        self.memory_tracked_peak = value;
    }
}

/// Merge one sample into a container's state, returning the new state
///
/// Samples with an unknown schema version, from an older version than the
/// tracked one, or overlapping an interval already covered are rejected and
/// leave the existing state untouched. A newer version starts over.
pub fn accumulate(
    state: Option<&ContainerUsageState>,
    sample: &ContainerStateSample,
    now: DateTime<Utc>,
    accepted_versions: &[u32],
    settings: &HistogramSettings,
) -> Result<ContainerUsageState> {
    if !accepted_versions.contains(&sample.version) {
        return Err(RecommenderError::SchemaIncompatible {
            version: sample.version,
        });
    }

    if let Some(existing) = state {
        let covered = existing.version > sample.version
            || (existing.version == sample.version
                && (sample.first_sample_start < existing.last_sample_start
                    || sample.last_sample_start <= existing.last_sample_start));
        if covered {
            return Err(RecommenderError::StaleOrDuplicateSample {
                container: sample.container_name.clone(),
            });
        }
    }

    let cpu_sample =
        DecayingHistogram::from_checkpoint(settings.cpu, settings.half_life, &sample.cpu_histogram)?;

    let mut next = match state {
        Some(existing) if existing.version == sample.version => existing.clone(),
        _ => ContainerUsageState::fresh(sample, settings),
    };

    next.last_update_time = now;
    next.last_sample_start = sample.last_sample_start;
    next.total_samples_count += sample.total_samples_count;
    next.cpu_histogram.merge(&cpu_sample)?;
    next.record_memory_peak(
        sample.memory_peak,
        sample.memory_peak_time,
        settings.memory_interval,
    );

    Ok(next)
}
