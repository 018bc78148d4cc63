//! Latency statistics over a set of samples.
//!
//! All functions here are pure: the same sample set always yields the same
//! result. Empty or single-element sets degrade to zero rather than NaN.
//!
//! # Key Types
//!
//! - [`Counter`] - Tracks successes, failures and delivered bytes.
//! - [`LatencyStats`] - Minimum, maximum, mean and sample standard deviation.

mod counter;

pub use counter::Counter;

use serde::Serialize;

/// Summary of a latency sample set, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (divisor `n - 1`).
    pub stdev: f64,
}

impl LatencyStats {
    /// Computes the summary of `samples`.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        Self {
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: mean(samples),
            stdev: sample_stdev(samples),
        }
    }
}

/// Arithmetic mean, `0` for an empty set.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation, `0` for fewer than two samples.
pub fn sample_stdev(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let var = samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Events per second, `0` when no time has elapsed.
pub fn rate(count: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 { count as f64 / elapsed_secs } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_set_is_zero() {
        assert_eq!(LatencyStats::from_samples(&[]), LatencyStats::default());
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_single_sample_has_no_deviation() {
        let s = LatencyStats::from_samples(&[4.5]);
        assert_eq!((s.min, s.max, s.mean, s.stdev), (4.5, 4.5, 4.5, 0.0));
    }

    #[test]
    fn test_known_values() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = LatencyStats::from_samples(&samples);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!(approx(s.mean, 5.0));
        // population stdev is 2.0; sample stdev is sqrt(32 / 7)
        assert!(approx(s.stdev, (32.0f64 / 7.0).sqrt()));
        assert!(s.min <= s.mean && s.mean <= s.max);
    }

    #[test]
    fn test_stats_are_pure() {
        let samples = [0.31, 0.12, 1.7, 0.05, 0.9];
        assert_eq!(LatencyStats::from_samples(&samples), LatencyStats::from_samples(&samples));
    }

    #[test]
    fn test_rate_with_zero_elapsed() {
        assert_eq!(rate(10, 0.0), 0.0);
        assert_eq!(rate(10, 2.0), 5.0);
        assert_eq!(rate(0, 1.0), 0.0);
    }
}
