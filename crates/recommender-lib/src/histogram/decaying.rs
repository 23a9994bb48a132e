//! Exponentially decaying histogram
//!
//! Every sample's weight is multiplied by `2^((t - reference) / half_life)`,
//! so a sample one half-life older than another counts half as much. The
//! reference timestamp moves forward whenever the exponent would grow past
//! `MAX_DECAY_EXPONENT`, rescaling the stored weights to keep them finite.

use super::options::{HistogramOptions, EPSILON};
use crate::error::{RecommenderError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest bucket weight stored in a checkpoint
pub const MAX_CHECKPOINT_WEIGHT: u32 = 10_000;

const MAX_DECAY_EXPONENT: i32 = 100;

/// Serializable snapshot of a decaying histogram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramCheckpoint {
    pub reference_timestamp: Option<DateTime<Utc>>,
    pub bucket_weights: BTreeMap<u32, u32>,
    pub total_weight: f64,
}

impl HistogramCheckpoint {
    pub fn is_empty(&self) -> bool {
        self.bucket_weights.is_empty() || self.total_weight < EPSILON
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecayingHistogram {
    options: HistogramOptions,
    half_life: Duration,
    reference: DateTime<Utc>,
    bucket_weights: Vec<f64>,
    total_weight: f64,
    min_bucket: usize,
    max_bucket: usize,
}

impl DecayingHistogram {
    pub fn new(options: HistogramOptions, half_life: Duration) -> Self {
        let num_buckets = options.num_buckets();
        Self {
            options,
            half_life,
            reference: DateTime::<Utc>::UNIX_EPOCH,
            bucket_weights: vec![0.0; num_buckets],
            total_weight: 0.0,
            min_bucket: num_buckets - 1,
            max_bucket: 0,
        }
    }

    /// Rebuild a histogram from a checkpoint taken with the same options
    pub fn from_checkpoint(
        options: HistogramOptions,
        half_life: Duration,
        checkpoint: &HistogramCheckpoint,
    ) -> Result<Self> {
        let mut histogram = Self::new(options, half_life);
        if checkpoint.is_empty() {
            return Ok(histogram);
        }

        let num_buckets = histogram.bucket_weights.len();
        let stored: u64 = checkpoint.bucket_weights.values().map(|w| *w as u64).sum();
        let ratio = checkpoint.total_weight / stored as f64;

        for (bucket, weight) in &checkpoint.bucket_weights {
            let bucket = *bucket as usize;
            if bucket >= num_buckets {
                return Err(RecommenderError::IncompatibleHistogram(format!(
                    "checkpoint bucket {} outside {} buckets",
                    bucket, num_buckets
                )));
            }
            histogram.bucket_weights[bucket] += *weight as f64 * ratio;
        }

        histogram.total_weight = histogram.bucket_weights.iter().sum();
        if let Some(reference) = checkpoint.reference_timestamp {
            histogram.reference = reference;
        }
        histogram.update_min_and_max_bucket();
        Ok(histogram)
    }

    pub fn save_to_checkpoint(&self) -> HistogramCheckpoint {
        if self.is_empty() {
            return HistogramCheckpoint::default();
        }

        let max = self.bucket_weights[self.min_bucket..=self.max_bucket]
            .iter()
            .cloned()
            .fold(0.0, f64::max);
        let ratio = MAX_CHECKPOINT_WEIGHT as f64 / max;

        let bucket_weights = (self.min_bucket..=self.max_bucket)
            .filter_map(|bucket| {
                let weight = (self.bucket_weights[bucket] * ratio).round() as u32;
                (weight > 0).then_some((bucket as u32, weight))
            })
            .collect();

        HistogramCheckpoint {
            reference_timestamp: Some(self.reference),
            bucket_weights,
            total_weight: self.total_weight,
        }
    }

    pub fn options(&self) -> &HistogramOptions {
        &self.options
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn reference_timestamp(&self) -> DateTime<Utc> {
        self.reference
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight < EPSILON
    }

    pub fn add_sample(&mut self, value: f64, weight: f64, time: DateTime<Utc>) {
        let decayed = weight * self.decay_factor(time);
        if !(decayed > 0.0) {
            return;
        }
        let bucket = self.options.find_bucket(value);
        self.bucket_weights[bucket] += decayed;
        self.total_weight += decayed;
        self.min_bucket = self.min_bucket.min(bucket);
        self.max_bucket = self.max_bucket.max(bucket);
    }

    pub fn subtract_sample(&mut self, value: f64, weight: f64, time: DateTime<Utc>) {
        let decayed = weight * self.decay_factor(time);
        if !(decayed > 0.0) {
            return;
        }
        let bucket = self.options.find_bucket(value);
        let removed = decayed.min(self.bucket_weights[bucket]);
        self.bucket_weights[bucket] -= removed;
        self.total_weight = (self.total_weight - removed).max(0.0);
        if self.bucket_weights[bucket] < EPSILON {
            self.bucket_weights[bucket] = 0.0;
            self.update_min_and_max_bucket();
        }
    }

    /// Add all of `other`'s weight to this histogram
    pub fn merge(&mut self, other: &DecayingHistogram) -> Result<()> {
        if self.options != other.options || self.half_life != other.half_life {
            return Err(RecommenderError::IncompatibleHistogram(format!(
                "cannot merge {:?} (half-life {}s) into {:?} (half-life {}s)",
                other.options,
                other.half_life.num_seconds(),
                self.options,
                self.half_life.num_seconds()
            )));
        }
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            self.reference = other.reference;
        } else if other.reference > self.reference {
            self.shift_reference(other.reference);
        }

        let factor = self.exponent_factor(other.reference, self.reference);
        for bucket in other.min_bucket..=other.max_bucket {
            let weight = other.bucket_weights[bucket] * factor;
            if weight > 0.0 {
                self.bucket_weights[bucket] += weight;
                self.total_weight += weight;
            }
        }
        self.update_min_and_max_bucket();
        Ok(())
    }

    /// Smallest bucket boundary below which `percentile` of the weight lies
    pub fn percentile(&self, percentile: f64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let threshold = percentile * self.total_weight;
        let mut partial_sum = 0.0;
        let mut bucket = self.min_bucket;
        while bucket < self.max_bucket {
            partial_sum += self.bucket_weights[bucket];
            if partial_sum >= threshold {
                break;
            }
            bucket += 1;
        }
        if bucket < self.bucket_weights.len() - 1 {
            self.options.bucket_start(bucket + 1)
        } else {
            self.options.bucket_start(bucket)
        }
    }

    fn decay_factor(&mut self, time: DateTime<Utc>) -> f64 {
        if self.is_empty() {
            self.reference = self.round_to_half_life(time);
        }
        let max_allowed = self.reference + self.half_life * MAX_DECAY_EXPONENT;
        if time > max_allowed {
            self.shift_reference(time);
        }
        self.exponent_factor(time, self.reference)
    }

    /// `2^((time - reference) / half_life)`
    fn exponent_factor(&self, time: DateTime<Utc>, reference: DateTime<Utc>) -> f64 {
        let elapsed = (time - reference).num_milliseconds() as f64;
        let half_life = self.half_life.num_milliseconds().max(1) as f64;
        2f64.powf(elapsed / half_life)
    }

    fn shift_reference(&mut self, time: DateTime<Utc>) {
        let new_reference = self.round_to_half_life(time);
        let factor = self.exponent_factor(self.reference, new_reference);
        for weight in self.bucket_weights.iter_mut() {
            *weight *= factor;
            if *weight < EPSILON {
                *weight = 0.0;
            }
        }
        self.total_weight = self.bucket_weights.iter().sum();
        self.reference = new_reference;
        self.update_min_and_max_bucket();
    }

    fn round_to_half_life(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.half_life.num_milliseconds().max(1);
        let millis = time.timestamp_millis();
        let rounded = millis - millis.rem_euclid(step);
        DateTime::<Utc>::from_timestamp_millis(rounded).unwrap_or(time)
    }

    fn update_min_and_max_bucket(&mut self) {
        let last = self.bucket_weights.len() - 1;
        self.min_bucket = self
            .bucket_weights
            .iter()
            .position(|w| *w >= EPSILON)
            .unwrap_or(last);
        self.max_bucket = self
            .bucket_weights
            .iter()
            .rposition(|w| *w >= EPSILON)
            .unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn histogram() -> DecayingHistogram {
        DecayingHistogram::new(HistogramOptions::cpu(), Duration::hours(24))
    }

    #[test]
    fn test_empty_histogram() {
        let h = histogram();
        assert!(h.is_empty());
        assert_eq!(h.percentile(0.5), 0.0);
        assert!(h.save_to_checkpoint().is_empty());
    }

    #[test]
    fn test_percentiles_follow_weight() {
        let mut h = histogram();
        for _ in 0..90 {
            h.add_sample(0.1, 1.0, start());
        }
        for _ in 0..10 {
            h.add_sample(2.0, 1.0, start());
        }
        let p50 = h.percentile(0.5);
        let p95 = h.percentile(0.95);
        assert!(p50 > 0.1 && p50 < 0.12, "p50 was {}", p50);
        assert!(p95 > 2.0 && p95 < 2.2, "p95 was {}", p95);
    }

    #[test]
    fn test_older_samples_decay() {
        let mut h = histogram();
        h.add_sample(0.1, 1.0, start());
        h.add_sample(2.0, 1.0, start() + Duration::hours(24));
        // the newer sample weighs twice as much
        assert!((h.total_weight() - 3.0).abs() < 1e-9);
        assert!(h.percentile(0.4) > 2.0);
    }

    #[test]
    fn test_reference_shift_keeps_relative_weights() {
        let mut h = histogram();
        h.add_sample(0.1, 1.0, start());
        let later = start() + Duration::hours(24 * 150);
        h.add_sample(2.0, 1.0, later);
        assert!(h.reference_timestamp() > start());
        assert!(h.total_weight().is_finite());
        // the old sample has decayed to nothing compared to the new one
        assert!(h.percentile(0.01) > 2.0);
    }

    #[test]
    fn test_subtract_sample() {
        let mut h = histogram();
        h.add_sample(0.5, 1.0, start());
        h.add_sample(1.0, 1.0, start());
        h.subtract_sample(1.0, 1.0, start());
        assert!((h.total_weight() - 1.0).abs() < 1e-9);
        assert!(h.percentile(1.0) < 0.6);

        // subtracting more than present never goes negative
        h.subtract_sample(0.5, 5.0, start());
        assert!(h.is_empty());
    }

    #[test]
    fn test_merge_adds_weights() {
        let mut a = histogram();
        let mut b = histogram();
        a.add_sample(0.1, 1.0, start());
        b.add_sample(0.1, 1.0, start());
        b.add_sample(1.0, 2.0, start());
        a.merge(&b).unwrap();
        assert!((a.total_weight() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_aligns_references() {
        let mut a = histogram();
        let mut b = histogram();
        a.add_sample(0.1, 1.0, start());
        b.add_sample(0.1, 1.0, start() + Duration::hours(48));
        a.merge(&b).unwrap();
        // a's sample is two half-lives older than b's reference
        assert_eq!(a.reference_timestamp(), start() + Duration::hours(48));
        assert!((a.total_weight() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_merge_rejects_different_options() {
        let mut a = histogram();
        let mut b = DecayingHistogram::new(HistogramOptions::memory(), Duration::hours(24));
        b.add_sample(1e8, 1.0, start());
        assert!(matches!(
            a.merge(&b),
            Err(RecommenderError::IncompatibleHistogram(_))
        ));
    }

    #[test]
    fn test_checkpoint_preserves_distribution() {
        let mut h = histogram();
        for i in 0..50 {
            h.add_sample(0.05 * (i % 10 + 1) as f64, 1.0, start() + Duration::minutes(i));
        }
        let checkpoint = h.save_to_checkpoint();
        assert_eq!(
            checkpoint.bucket_weights.values().max().copied(),
            Some(MAX_CHECKPOINT_WEIGHT)
        );

        let restored = DecayingHistogram::from_checkpoint(
            HistogramOptions::cpu(),
            Duration::hours(24),
            &checkpoint,
        )
        .unwrap();
        assert!((restored.total_weight() - h.total_weight()).abs() < 1e-6);
        assert_eq!(restored.reference_timestamp(), h.reference_timestamp());
        for p in [0.45, 0.75, 0.85] {
            assert_eq!(restored.percentile(p), h.percentile(p));
        }
    }

    #[test]
    fn test_checkpoint_json_shape() {
        let mut h = histogram();
        h.add_sample(0.25, 1.0, start());
        let json = serde_json::to_string(&h.save_to_checkpoint()).unwrap();
        let back: HistogramCheckpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h.save_to_checkpoint());
    }

    #[test]
    fn test_checkpoint_with_unknown_bucket_rejected() {
        let mut checkpoint = HistogramCheckpoint {
            reference_timestamp: Some(start()),
            total_weight: 1.0,
            ..Default::default()
        };
        checkpoint.bucket_weights.insert(100_000, 10);
        assert!(DecayingHistogram::from_checkpoint(
            HistogramOptions::cpu(),
            Duration::hours(24),
            &checkpoint
        )
        .is_err());
    }
}
