//! Persisted form of a container's usage state

use super::ContainerUsageState;
use crate::config::HistogramSettings;
use crate::error::Result;
use crate::histogram::{DecayingHistogram, HistogramCheckpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerCheckpoint {
    pub version: u32,
    pub first_sample_start: DateTime<Utc>,
    pub last_sample_start: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub total_samples_count: u64,
    pub cpu_histogram: HistogramCheckpoint,
    pub memory_histogram: HistogramCheckpoint,
    #[serde(default)]
    pub memory_window_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub memory_peak: f64,
}

impl ContainerUsageState {
    pub fn to_checkpoint(&self) -> ContainerCheckpoint {
        ContainerCheckpoint {
            version: self.version,
            first_sample_start: self.first_sample_start,
            last_sample_start: self.last_sample_start,
            last_update_time: self.last_update_time,
            total_samples_count: self.total_samples_count,
            cpu_histogram: self.cpu_histogram.save_to_checkpoint(),
            memory_histogram: self.memory_histogram.save_to_checkpoint(),
            memory_window_end: self.memory_window_end,
            memory_peak: self.memory_tracked_peak,
        }
    }

    pub fn from_checkpoint(
        checkpoint: &ContainerCheckpoint,
        settings: &HistogramSettings,
    ) -> Result<Self> {
        Ok(Self {
            version: checkpoint.version,
            first_sample_start: checkpoint.first_sample_start,
            last_sample_start: checkpoint.last_sample_start,
            last_update_time: checkpoint.last_update_time,
            total_samples_count: checkpoint.total_samples_count,
            cpu_histogram: DecayingHistogram::from_checkpoint(
                settings.cpu,
                settings.half_life,
                &checkpoint.cpu_histogram,
            )?,
            memory_histogram: DecayingHistogram::from_checkpoint(
                settings.memory,
                settings.half_life,
                &checkpoint.memory_histogram,
            )?,
            memory_window_end: checkpoint.memory_window_end,
            memory_tracked_peak: checkpoint.memory_peak,
        })
    }
}
