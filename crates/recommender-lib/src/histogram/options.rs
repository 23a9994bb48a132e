//! Exponential bucket layout shared by all histograms of one resource

use serde::{Deserialize, Serialize};

/// Weights below this value are treated as zero
pub const EPSILON: f64 = 0.0001;

/// Bucket `i` starts at `first_bucket_size * (ratio^i - 1) / (ratio - 1)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramOptions {
    pub first_bucket_size: f64,
    pub ratio: f64,
    pub max_value: f64,
}

impl HistogramOptions {
    pub fn exponential(first_bucket_size: f64, ratio: f64, max_value: f64) -> Self {
        Self {
            first_bucket_size,
            ratio,
            max_value,
        }
    }

    /// Cpu usage in cores: 10 millicores up to 1000 cores
    pub fn cpu() -> Self {
        Self::exponential(0.01, 1.05, 1000.0)
    }

    /// Memory usage in bytes: 10MB up to 1TB
    pub fn memory() -> Self {
        Self::exponential(1e7, 1.05, 1e12)
    }

    pub fn num_buckets(&self) -> usize {
        let n = (self.max_value * (self.ratio - 1.0) / self.first_bucket_size + 1.0).ln()
            / self.ratio.ln();
        n.ceil() as usize + 1
    }

    pub fn find_bucket(&self, value: f64) -> usize {
        if value < self.first_bucket_size {
            return 0;
        }
        let bucket = ((value * (self.ratio - 1.0) / self.first_bucket_size + 1.0).ln()
            / self.ratio.ln()) as usize;
        bucket.min(self.num_buckets() - 1)
    }

    pub fn bucket_start(&self, bucket: usize) -> f64 {
        self.first_bucket_size * (self.ratio.powi(bucket as i32) - 1.0) / (self.ratio - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        let options = HistogramOptions::exponential(1.0, 2.0, 100.0);
        // starts: 0, 1, 3, 7, 15, 31, 63, 127
        assert_eq!(options.num_buckets(), 8);
        assert_eq!(options.bucket_start(0), 0.0);
        assert_eq!(options.bucket_start(3), 7.0);
        assert_eq!(options.find_bucket(0.5), 0);
        assert_eq!(options.find_bucket(1.5), 1);
        assert_eq!(options.find_bucket(6.9), 2);
        assert_eq!(options.find_bucket(7.5), 3);
        assert_eq!(options.find_bucket(1e9), 7);
    }

    #[test]
    fn test_value_falls_inside_its_bucket() {
        let options = HistogramOptions::cpu();
        for value in [0.02, 0.25, 1.0, 3.7, 250.0] {
            let bucket = options.find_bucket(value);
            assert!(options.bucket_start(bucket) <= value + 1e-9);
            assert!(options.bucket_start(bucket + 1) > value);
        }
    }
}
