//! Per-client run results and their aggregate.
use serde::Serialize;
use tokio::time::Duration;

use crate::{
    error::HistogramError,
    histogram::LatencyHistogram,
    publisher::PublisherExit,
    stats::{self, Counter, LatencyStats},
};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The publisher went through the whole message count.
    Completed,
    /// The broker rejected the connection.
    ConnectFailed(String),
    /// The broker did not answer the connection attempt in time.
    ConnectTimeout,
    /// The publisher stopped before its message count was reached.
    Aborted,
}

impl From<&PublisherExit> for RunOutcome {
    fn from(exit: &PublisherExit) -> Self {
        use crate::error::ConnectError;
        match exit {
            PublisherExit::Finished { .. } => RunOutcome::Completed,
            PublisherExit::ConnectFailed(ConnectError::Refused(reason)) => RunOutcome::ConnectFailed(reason.clone()),
            PublisherExit::ConnectFailed(ConnectError::Timeout(_)) => RunOutcome::ConnectTimeout,
            PublisherExit::InputClosed { .. } => RunOutcome::Aborted,
        }
    }
}

/// The summary of one client run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Client identifier.
    pub id: u32,
    /// Configured message count.
    pub total: u64,
    /// Messages acknowledged in time.
    pub successes: u64,
    /// Messages that failed or timed out.
    pub failures: u64,
    /// Payload bytes of acknowledged messages.
    pub bytes: u64,
    /// Delivery latency summary, in milliseconds.
    pub latency: LatencyStats,
    /// Wall-clock run duration.
    pub run_time: Duration,
    /// Successful messages per second.
    pub msgs_per_sec: f64,
    /// Delivery latency distribution.
    pub hist: LatencyHistogram,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl RunResult {
    /// A zeroed result for the given client.
    pub fn new(id: u32, total: u64) -> Self {
        Self {
            id,
            total,
            successes: 0,
            failures: 0,
            bytes: 0,
            latency: LatencyStats::default(),
            run_time: Duration::ZERO,
            msgs_per_sec: 0.0,
            hist: LatencyHistogram::new(),
            outcome: RunOutcome::Completed,
        }
    }

    /// Fills in the derived fields. Consumes the result so it is finalized once.
    pub(crate) fn finalize(
        mut self,
        counter: Counter,
        samples: &[f64],
        elapsed: Duration,
        outcome: RunOutcome,
    ) -> Self {
        self.successes = counter.successes;
        self.failures = counter.failures;
        self.bytes = counter.bytes;
        self.latency = LatencyStats::from_samples(samples);
        self.run_time = elapsed;
        self.msgs_per_sec = stats::rate(counter.successes, elapsed.as_secs_f64());
        self.outcome = outcome;
        self
    }

    /// Fraction of completed messages that succeeded, `0` when none completed.
    pub fn ratio(&self) -> f64 {
        let completed = self.successes + self.failures;
        if completed == 0 { 0.0 } else { self.successes as f64 / completed as f64 }
    }
}

/// Aggregate over the results of all clients of a benchmark.
#[derive(Debug, Clone)]
pub struct TotalResults {
    /// Number of client runs.
    pub clients: usize,
    /// Fraction of completed messages that succeeded.
    pub ratio: f64,
    /// Sum of successes.
    pub successes: u64,
    /// Sum of failures.
    pub failures: u64,
    /// Sum of acknowledged payload bytes.
    pub bytes: u64,
    /// Wall-clock time of the whole benchmark.
    pub total_run_time: Duration,
    /// Mean per-client run time.
    pub avg_run_time: Duration,
    /// Smallest per-client minimum latency, in milliseconds.
    pub msg_time_min: f64,
    /// Largest per-client maximum latency, in milliseconds.
    pub msg_time_max: f64,
    /// Mean of the per-client mean latencies, in milliseconds.
    pub msg_time_mean_avg: f64,
    /// Sample standard deviation of the per-client mean latencies.
    pub msg_time_mean_std: f64,
    /// Sum of the per-client throughputs.
    pub total_msgs_per_sec: f64,
    /// Mean per-client throughput.
    pub avg_msgs_per_sec: f64,
    /// Merged latency distribution of every client.
    pub hist: LatencyHistogram,
}

impl TotalResults {
    /// Aggregates `runs`, which took `wall_time` altogether.
    ///
    /// Latency extremes and means only consider runs that recorded at least
    /// one successful delivery.
    pub fn from_runs(runs: &[RunResult], wall_time: Duration) -> Result<Self, HistogramError> {
        let mut counter = Counter::default();
        let mut hist = LatencyHistogram::new();
        let mut total_msgs_per_sec = 0.0;

        for run in runs {
            counter.successes += run.successes;
            counter.failures += run.failures;
            counter.bytes += run.bytes;
            total_msgs_per_sec += run.msgs_per_sec;
            hist.merge(&run.hist)?;
        }

        let measured = || runs.iter().filter(|r| r.successes > 0);
        let means: Vec<f64> = measured().map(|r| r.latency.mean).collect();
        let msg_time_min = measured().map(|r| r.latency.min).reduce(f64::min).unwrap_or_default();
        let msg_time_max = measured().map(|r| r.latency.max).reduce(f64::max).unwrap_or_default();

        let run_times: Vec<f64> = runs.iter().map(|r| r.run_time.as_secs_f64()).collect();
        let rates: Vec<f64> = runs.iter().map(|r| r.msgs_per_sec).collect();
        let completed = counter.completed();

        Ok(Self {
            clients: runs.len(),
            ratio: if completed == 0 { 0.0 } else { counter.successes as f64 / completed as f64 },
            successes: counter.successes,
            failures: counter.failures,
            bytes: counter.bytes,
            total_run_time: wall_time,
            avg_run_time: Duration::from_secs_f64(stats::mean(&run_times)),
            msg_time_min,
            msg_time_max,
            msg_time_mean_avg: stats::mean(&means),
            msg_time_mean_std: stats::sample_stdev(&means),
            total_msgs_per_sec,
            avg_msgs_per_sec: stats::mean(&rates),
            hist,
        })
    }
}

/// The final benchmark report: every client run plus their aggregate.
pub struct BenchReport {
    /// Per-client results, ordered by client id.
    pub runs: Vec<RunResult>,
    /// Aggregate over `runs`.
    pub totals: TotalResults,
}

impl BenchReport {
    /// Sorts `runs` by client id and aggregates them.
    pub fn new(mut runs: Vec<RunResult>, wall_time: Duration) -> Result<Self, HistogramError> {
        runs.sort_by_key(|r| r.id);
        let totals = TotalResults::from_runs(&runs, wall_time)?;
        Ok(Self { runs, totals })
    }
}
