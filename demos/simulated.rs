//! Runs the benchmark against the in-process simulated broker.
//!
//! ```shell
//! RUST_LOG=info cargo run --example simulated -- --clients 4 --count 500 --timeout 20ms
//! ```
use anyhow::Result;
use clap::Parser;
use pubload::{broker::SimBroker, cli::BenchCli};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // a slightly lossy broker: occasional errors, stalls and one connection drop per client
    let broker = SimBroker::new()
        .with_latency(Duration::from_micros(300))
        .fail_every(97)
        .hang_every(211)
        .lose_connection_at(150, 5);

    pubload::cli::run(BenchCli::parse(), broker).await
}
