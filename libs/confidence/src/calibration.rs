//! Confidence calibration: agreement between stated confidence and
//! observed success frequency, tracked per 10-point bucket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bucket width in confidence points; buckets are 0, 10, ..., 90.
const BUCKET_WIDTH: f64 = 10.0;
const MAX_BUCKET: u8 = 90;

/// Calibration error above which a correction kicks in.
const ERROR_THRESHOLD: f64 = 0.2;

/// Correction when the engine is over-confident for a bucket.
const OVERCONFIDENT_CORRECTION: f64 = -10.0;

/// Correction when the engine is under-confident for a bucket.
const UNDERCONFIDENT_CORRECTION: f64 = 5.0;

/// Per-bucket prediction accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub predictions: u64,
    pub successes: u64,
    pub actual_success_rate: f64,
    /// |actual rate - bucket/100|
    pub calibration_error: f64,
}

/// Summary row exposed for learning metrics (buckets with enough samples).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub bucket: u8,
    pub predicted_rate: f64,
    pub actual_rate: f64,
    pub calibration_error: f64,
    pub sample_size: u64,
}

/// Buckets historical (predicted confidence, outcome) pairs and exposes a
/// correction signal once a bucket has enough samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationTracker {
    buckets: BTreeMap<u8, CalibrationBucket>,
}

/// floor(confidence / 10) * 10, clamped into the 0..=90 range.
pub fn bucket_of(confidence: f64) -> u8 {
    let clamped = confidence.clamp(0.0, 100.0);
    (((clamped / BUCKET_WIDTH).floor() * BUCKET_WIDTH) as u8).min(MAX_BUCKET)
}

impl CalibrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one (predicted confidence, realized success) pair.
    pub fn record(&mut self, confidence: f64, success: bool) {
        let bucket_key = bucket_of(confidence);
        let bucket = self.buckets.entry(bucket_key).or_default();

        bucket.predictions += 1;
        if success {
            bucket.successes += 1;
        }
        bucket.actual_success_rate = bucket.successes as f64 / bucket.predictions as f64;
        bucket.calibration_error =
            (bucket.actual_success_rate - bucket_key as f64 / 100.0).abs();

        debug!(
            bucket = bucket_key,
            predictions = bucket.predictions,
            actual_rate = bucket.actual_success_rate,
            error = bucket.calibration_error,
            "calibration bucket updated"
        );
    }

    /// Correction nudge for a confidence value, active only once its bucket
    /// holds at least `min_samples` predictions.
    ///
    /// Over-confident buckets (actual below predicted, error > 0.2) pull the
    /// score down by 10; under-confident buckets push it up by 5.
    pub fn correction_for(&self, confidence: f64, min_samples: u64) -> f64 {
        let bucket_key = bucket_of(confidence);
        let Some(bucket) = self.buckets.get(&bucket_key) else {
            return 0.0;
        };
        if bucket.predictions < min_samples {
            return 0.0;
        }
        if bucket.calibration_error > ERROR_THRESHOLD {
            if bucket.actual_success_rate < bucket_key as f64 / 100.0 {
                OVERCONFIDENT_CORRECTION
            } else {
                UNDERCONFIDENT_CORRECTION
            }
        } else {
            0.0
        }
    }

    pub fn bucket(&self, confidence: f64) -> Option<&CalibrationBucket> {
        self.buckets.get(&bucket_of(confidence))
    }

    /// Buckets with at least `min_samples` predictions, for metrics reporting.
    pub fn summary(&self, min_samples: u64) -> Vec<CalibrationSummary> {
        self.buckets
            .iter()
            .filter(|(_, b)| b.predictions >= min_samples)
            .map(|(&bucket, b)| CalibrationSummary {
                bucket,
                predicted_rate: bucket as f64 / 100.0,
                actual_rate: b.actual_success_rate,
                calibration_error: b.calibration_error,
                sample_size: b.predictions,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_assignment() {
        assert_eq!(bucket_of(0.0), 0);
        assert_eq!(bucket_of(9.99), 0);
        assert_eq!(bucket_of(10.0), 10);
        assert_eq!(bucket_of(75.0), 70);
        assert_eq!(bucket_of(100.0), 90);
    }

    #[test]
    fn correction_inactive_below_min_samples() {
        let mut tracker = CalibrationTracker::new();
        for _ in 0..9 {
            tracker.record(75.0, true);
        }
        assert_eq!(tracker.correction_for(75.0, 10), 0.0);
    }

    #[test]
    fn underconfident_bucket_pushes_up() {
        // 15 outcomes in [70,80) all successful: actual=1.0, error=0.3>0.2,
        // actual >= predicted → +5
        let mut tracker = CalibrationTracker::new();
        for _ in 0..15 {
            tracker.record(75.0, true);
        }
        let bucket = tracker.bucket(75.0).unwrap();
        assert_eq!(bucket.actual_success_rate, 1.0);
        assert!((bucket.calibration_error - 0.3).abs() < 1e-9);
        assert_eq!(tracker.correction_for(75.0, 10), 5.0);
    }

    #[test]
    fn overconfident_bucket_pulls_down() {
        let mut tracker = CalibrationTracker::new();
        for i in 0..20 {
            // 80s bucket with only 20% realized success
            tracker.record(85.0, i % 5 == 0);
        }
        assert_eq!(tracker.correction_for(85.0, 10), -10.0);
    }

    #[test]
    fn well_calibrated_bucket_converges_to_zero_correction() {
        // Bucket 70 fed its own midpoint rate: 7 wins in 10, repeated
        let mut tracker = CalibrationTracker::new();
        for i in 0..20 {
            tracker.record(75.0, i % 10 < 7);
        }
        let bucket = tracker.bucket(75.0).unwrap();
        assert!(bucket.calibration_error < 0.01);
        assert_eq!(tracker.correction_for(75.0, 10), 0.0);
    }

    #[test]
    fn correction_is_bounded() {
        let mut tracker = CalibrationTracker::new();
        for _ in 0..50 {
            tracker.record(5.0, true);
            tracker.record(95.0, false);
        }
        for conf in [5.0, 50.0, 95.0] {
            let c = tracker.correction_for(conf, 10);
            assert!((-20.0..=20.0).contains(&c));
        }
    }
}
