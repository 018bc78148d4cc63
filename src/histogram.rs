//! A thin wrapper around [`hdrhistogram::Histogram`] for delivery latencies.
use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::HistogramError;

pub(crate) const PERCENTAGES: &[f64] = &[50.0, 90.0, 95.0, 99.0, 99.9];

/// Delivery latency histogram with nanosecond resolution.
#[derive(Clone, Debug)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Creates an empty, auto-resizing histogram.
    pub fn new() -> LatencyHistogram {
        Self { hist: Histogram::<u64>::new(3).expect("create histogram") }
    }

    /// Records a latency value.
    pub fn record(&mut self, d: Duration) -> Result<(), HistogramError> {
        let nanos = u64::try_from(d.as_nanos()).map_err(|_| HistogramError::LatencyTooLarge { latency: d })?;
        Ok(self.hist.record(nanos)?)
    }

    /// Adds every value recorded in `other`.
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<(), HistogramError> {
        Ok(self.hist.add(&other.hist)?)
    }

    /// Number of recorded values.
    pub fn len(&self) -> u64 {
        self.hist.len()
    }

    /// Returns true if this histogram has no recorded values.
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    /// Latency at the given quantile.
    pub fn value_at_quantile(&self, q: f64) -> Duration {
        Duration::from_nanos(self.hist.value_at_quantile(q))
    }

    /// Latency in milliseconds at each of the given percentages.
    pub fn percentiles_ms<'a>(&'a self, percentages: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
        percentages
            .iter()
            .map(|&p| (p, self.value_at_quantile(p / 100.0).as_secs_f64() * 1000.0))
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
