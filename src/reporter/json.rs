use crate::{
    histogram::PERCENTAGES,
    report::{BenchReport, RunOutcome, RunResult, TotalResults},
    stats::LatencyStats,
};

use super::BenchReporter;

use serde::Serialize;
use std::{collections::BTreeMap, io::Write};

/// Prints the report as pretty JSON.
pub struct JsonReporter;

impl BenchReporter for JsonReporter {
    fn print(&self, w: &mut dyn Write, report: &BenchReport) -> anyhow::Result<()> {
        let runs = report.runs.iter().map(Run::from).collect();
        let totals = Totals::from(&report.totals);
        serde_json::to_writer_pretty(&mut *w, &Report { runs, totals })?;
        writeln!(w)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct Run<'a> {
    id: u32,
    outcome: &'a RunOutcome,
    total: u64,
    successes: u64,
    failures: u64,
    ratio: f64,
    bytes: u64,
    run_time: f64,
    msgs_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency: Option<Latency>,
}

impl<'a> From<&'a RunResult> for Run<'a> {
    fn from(r: &'a RunResult) -> Self {
        Self {
            id: r.id,
            outcome: &r.outcome,
            total: r.total,
            successes: r.successes,
            failures: r.failures,
            ratio: r.ratio(),
            bytes: r.bytes,
            run_time: r.run_time.as_secs_f64(),
            msgs_per_sec: r.msgs_per_sec,
            latency: (r.successes > 0).then(|| Latency::new(r.latency, percentiles(&r.hist))),
        }
    }
}

#[derive(Serialize)]
struct Latency {
    #[serde(flatten)]
    stats: LatencyStats,
    percentiles: BTreeMap<String, f64>,
}

impl Latency {
    fn new(stats: LatencyStats, percentiles: BTreeMap<String, f64>) -> Self {
        Self { stats, percentiles }
    }
}

#[derive(Serialize)]
struct Totals {
    clients: usize,
    ratio: f64,
    successes: u64,
    failures: u64,
    bytes: u64,
    total_run_time: f64,
    avg_run_time: f64,
    msg_time_min: f64,
    msg_time_max: f64,
    msg_time_mean_avg: f64,
    msg_time_mean_std: f64,
    total_msgs_per_sec: f64,
    avg_msgs_per_sec: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    percentiles: BTreeMap<String, f64>,
}

impl From<&TotalResults> for Totals {
    fn from(t: &TotalResults) -> Self {
        Self {
            clients: t.clients,
            ratio: t.ratio,
            successes: t.successes,
            failures: t.failures,
            bytes: t.bytes,
            total_run_time: t.total_run_time.as_secs_f64(),
            avg_run_time: t.avg_run_time.as_secs_f64(),
            msg_time_min: t.msg_time_min,
            msg_time_max: t.msg_time_max,
            msg_time_mean_avg: t.msg_time_mean_avg,
            msg_time_mean_std: t.msg_time_mean_std,
            total_msgs_per_sec: t.total_msgs_per_sec,
            avg_msgs_per_sec: t.avg_msgs_per_sec,
            percentiles: percentiles(&t.hist),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    runs: Vec<Run<'a>>,
    totals: Totals,
}

fn percentiles(hist: &crate::histogram::LatencyHistogram) -> BTreeMap<String, f64> {
    if hist.is_empty() {
        return BTreeMap::new();
    }
    hist.percentiles_ms(PERCENTAGES).map(|(p, v)| (format!("p{p}"), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{broker::SimBroker, client::Client, config::ClientConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn test_json_report_shape() {
        let ok = Client::new(ClientConfig::new(0, "sim://", "/t").with_count(5).with_quiet(true), SimBroker::new());
        let refused = Client::new(
            ClientConfig::new(1, "sim://", "/t").with_count(5).with_quiet(true),
            SimBroker::new().refuse_connect("nope"),
        );
        let runs = vec![ok.run().await, refused.run().await];
        let report = BenchReport::new(runs, Duration::from_millis(10)).unwrap();

        let mut buf = Vec::new();
        JsonReporter.print(&mut buf, &report).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(v["runs"][0]["successes"], 5);
        assert_eq!(v["runs"][0]["outcome"]["kind"], "completed");
        assert!(v["runs"][0]["latency"]["percentiles"]["p50"].is_number());
        assert_eq!(v["runs"][1]["outcome"]["kind"], "connect_failed");
        assert_eq!(v["runs"][1]["outcome"]["reason"], "nope");
        assert!(v["runs"][1].get("latency").is_none());
        assert_eq!(v["totals"]["clients"], 2);
        assert_eq!(v["totals"]["successes"], 5);
        assert_eq!(v["totals"]["total_run_time"], 0.01);
    }
}
