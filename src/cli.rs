//! Command line front end that launches a fleet of clients.
//!
//! The broker connection is supplied by the caller, so a binary only has to
//! pick a [`BrokerClient`] implementation:
//!
//! ```no_run
//! use clap::Parser;
//! use pubload::{broker::SimBroker, cli::BenchCli};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     pubload::cli::run(BenchCli::parse(), SimBroker::new()).await
//! }
//! ```
//!
//! ```shell
//! $ pubload --broker tcp://localhost:1883 --clients 10 --count 1000 --qos 1 --size 256
//! ```
use std::{
    fs::File,
    io::stdout,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
};

use anyhow::Context;
use clap::{
    Parser, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use tokio::{sync::mpsc, task::JoinSet, time::Instant};

use crate::{
    broker::BrokerClient,
    client::Client,
    config::{ClientConfig, Credentials, DEFAULT_CONNECT_TIMEOUT, QoS},
    report::BenchReport,
    reporter::{BenchReporter, JsonReporter, TextReporter},
};

#[derive(Parser, Clone, Debug)]
#[clap(
    styles(Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
    )
)]
#[allow(missing_docs)]
pub struct BenchCli {
    /// Broker address
    #[clap(long, short = 'b', default_value = "tcp://localhost:1883")]
    pub broker: String,

    /// Topic to publish to
    #[clap(long, short = 't', default_value = "/test")]
    pub topic: String,

    /// Broker username
    #[clap(long, short = 'u')]
    pub username: Option<String>,

    /// Broker password
    #[clap(long, short = 'P')]
    pub password: Option<String>,

    /// QoS level for published messages (0, 1 or 2)
    #[clap(long, short = 'q', default_value = "1", value_parser = parse_qos)]
    pub qos: QoS,

    /// Payload size in bytes
    #[clap(long, short = 's', default_value_t = 100)]
    pub size: usize,

    /// Number of messages each client publishes
    #[clap(long, short = 'n', default_value = "100")]
    pub count: NonZeroU64,

    /// Number of clients to run concurrently
    #[clap(long, short = 'c', default_value = "10")]
    pub clients: NonZeroU32,

    /// Maximum wait for a publish acknowledgement
    ///
    /// Examples: --timeout 500ms, --timeout 5s
    #[clap(long, default_value = "5s")]
    pub timeout: humantime::Duration,

    /// Pause between two messages of the same client
    #[clap(long, short = 'd', default_value = "0s")]
    pub delay: humantime::Duration,

    /// Maximum wait for the broker to accept a connection
    #[clap(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.into())]
    pub connect_timeout: humantime::Duration,

    /// Suppress informational log lines
    #[clap(long)]
    pub quiet: bool,

    /// Output format for the report
    #[clap(short, long, value_enum, default_value_t = ReportFormat::Text, ignore_case = true)]
    pub output: ReportFormat,

    /// Output file path for the report
    ///
    /// When set, the report will be written to the specified file instead of stdout.
    #[clap(long, short = 'O')]
    pub output_file: Option<PathBuf>,
}

impl BenchCli {
    /// Run parameters of client `id`.
    pub fn client_config(&self, id: u32) -> ClientConfig {
        ClientConfig::new(id, self.broker.as_str(), self.topic.as_str())
            .with_credentials(Credentials::from_parts(self.username.clone(), self.password.clone()))
            .with_qos(self.qos)
            .with_payload_size(self.size)
            .with_count(self.count.get())
            .with_publish_timeout(self.timeout.into())
            .with_delay(self.delay.into())
            .with_connect_timeout(self.connect_timeout.into())
            .with_quiet(self.quiet)
    }

    /// Validated run parameters of every client.
    pub fn client_configs(&self) -> anyhow::Result<Vec<ClientConfig>> {
        (0..self.clients.get())
            .map(|id| {
                let config = self.client_config(id);
                config.validate().with_context(|| format!("invalid parameters for client {id}"))?;
                Ok(config)
            })
            .collect()
    }
}

fn parse_qos(s: &str) -> Result<QoS, String> {
    let level: u8 = s.parse().map_err(|_| format!("'{s}' is not a QoS level"))?;
    QoS::try_from(level).map_err(|e| e.to_string())
}

/// Benchmark report format.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ReportFormat {
    /// Report in plain text format. See [`TextReporter`].
    Text,

    /// Report in JSON format. See [`JsonReporter`].
    Json,
}

/// Run every client concurrently and gather their results.
///
/// Each client gets its own clone of `broker`; runs share nothing else.
pub async fn launch<C>(configs: Vec<ClientConfig>, broker: C) -> anyhow::Result<BenchReport>
where
    C: BrokerClient + Clone,
{
    let (res_tx, mut res_rx) = mpsc::channel(configs.len().max(1));
    let started = Instant::now();

    let mut set = JoinSet::new();
    for config in configs {
        set.spawn(Client::new(config, broker.clone()).run_into(res_tx.clone()));
    }
    drop(res_tx);

    let mut runs = Vec::new();
    while let Some(result) = res_rx.recv().await {
        runs.push(result);
    }
    while let Some(res) = set.join_next().await {
        res?;
    }

    Ok(BenchReport::new(runs, started.elapsed())?)
}

/// Run the benchmark described by `cli` against `broker` and print the report.
pub async fn run<C>(cli: BenchCli, broker: C) -> anyhow::Result<()>
where
    C: BrokerClient + Clone,
{
    let configs = cli.client_configs()?;
    let report = launch(configs, broker).await?;

    let reporter: &dyn BenchReporter = match cli.output {
        ReportFormat::Text => &TextReporter,
        ReportFormat::Json => &JsonReporter,
    };
    match cli.output_file {
        Some(path) => reporter.print(&mut File::create(path)?, &report)?,
        None => reporter.print(&mut stdout(), &report)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::SimBroker;
    use std::time::Duration;

    fn parse(args: &[&str]) -> BenchCli {
        BenchCli::try_parse_from(std::iter::once("pubload").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let cfg = cli.client_config(3);
        assert_eq!(cfg.id, 3);
        assert_eq!(cfg.broker, "tcp://localhost:1883");
        assert_eq!(cfg.qos, QoS::AtLeastOnce);
        assert_eq!(cfg.count, 100);
        assert_eq!(cfg.publish_timeout, Duration::from_secs(5));
        assert_eq!(cfg.delay, Duration::ZERO);
        assert_eq!(cfg.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(cfg.credentials.is_none());
        assert_eq!(cli.client_configs().unwrap().len(), 10);
    }

    #[test]
    fn test_parse_options() {
        let cli = parse(&[
            "-b", "tcp://broker:1883", "-t", "/bench", "-q", "2", "-s", "1024", "-n", "5", "-c", "3",
            "--timeout", "250ms", "-d", "10ms", "-u", "user", "-P", "pass", "-o", "json",
        ]);
        let cfg = cli.client_config(0);
        assert_eq!(cfg.qos, QoS::ExactlyOnce);
        assert_eq!(cfg.payload_size, 1024);
        assert_eq!(cfg.publish_timeout, Duration::from_millis(250));
        assert_eq!(cfg.delay, Duration::from_millis(10));
        assert_eq!(cfg.credentials.unwrap().username, "user");
        assert!(matches!(cli.output, ReportFormat::Json));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let parse_err = |args: &[&str]| BenchCli::try_parse_from(std::iter::once("pubload").chain(args.iter().copied()));
        assert!(parse_err(&["-q", "3"]).is_err());
        assert!(parse_err(&["-n", "0"]).is_err());
        assert!(parse_err(&["-c", "0"]).is_err());
        assert!(parse(&["-t", ""]).client_configs().is_err());
    }

    #[tokio::test]
    async fn test_launch_runs_every_client() {
        let broker = SimBroker::new();
        let cli = parse(&["-c", "4", "-n", "20", "--quiet"]);
        let report = launch(cli.client_configs().unwrap(), broker.clone()).await.unwrap();

        assert_eq!(report.runs.len(), 4);
        assert_eq!(report.totals.successes, 80);
        assert_eq!(report.totals.failures, 0);
        assert!(report.runs.iter().all(|r| r.total == 20));
        assert_eq!(broker.stats().connects, 4);
        assert_eq!(broker.stats().published, 80);
    }
}
