//! A publish load generator for benchmarking message brokers.
//!
//! Each simulated client runs a small pipeline of three concurrent stages:
//!
//! - a **generator** producing a fixed number of messages at a fixed pace,
//! - a **publisher** owning one broker connection and publishing every message
//!   with a bounded wait for its acknowledgement,
//! - a **client** tallying the outcomes and reducing the delivery latencies into
//!   a [`RunResult`].
//!
//! Failures never abort a run: a failed or timed-out publish counts as a failed
//! message, a failed connect ends the run with nothing counted.
//!
//! The wire protocol is not part of this crate. Plug a broker client library in
//! by implementing [`BrokerClient`](broker::BrokerClient); [`SimBroker`](broker::SimBroker)
//! is an in-process implementation with fault injection.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pubload::{Client, ClientConfig, QoS, broker::SimBroker};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::new(0, "tcp://localhost:1883", "/bench")
//!         .with_qos(QoS::AtLeastOnce)
//!         .with_count(1000)
//!         .with_payload_size(256)
//!         .with_publish_timeout(Duration::from_secs(1));
//!
//!     let result = Client::new(config, SimBroker::new()).run().await;
//!     println!("{} / {} delivered, {:.1} msg/s", result.successes, result.total, result.msgs_per_sec);
//! }
//! ```
#![deny(missing_docs)]

mod histogram;

pub mod broker;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod message;
pub mod publisher;
pub mod report;
pub mod reporter;
pub mod stats;

pub use crate::{
    client::Client,
    config::{ClientConfig, Credentials, QoS},
    histogram::LatencyHistogram,
    message::Message,
    report::{BenchReport, RunOutcome, RunResult, TotalResults},
    stats::LatencyStats,
};
