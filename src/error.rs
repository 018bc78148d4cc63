//! Error types for the publish pipeline.
//!
//! None of these escape a run as control flow: connect errors end up in
//! [`RunOutcome`](crate::report::RunOutcome) and publish errors become the
//! error flag of a single [`Message`](crate::message::Message).
use std::time::Duration;

use thiserror::Error;

/// Failure to establish the broker connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The broker (or the client library) answered with an explicit error.
    #[error("connection refused: {0}")]
    Refused(String),

    /// No answer within the connect window.
    #[error("no connection acknowledgement within {0:?}")]
    Timeout(Duration),
}

/// Failure of a single publish.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The underlying publish reported an error.
    #[error("publish failed: {0}")]
    Failed(String),

    /// The connection is down, e.g. while auto-reconnect is in progress.
    #[error("not connected to the broker")]
    NotConnected,

    /// The acknowledgement did not arrive within the per-publish window.
    #[error("no publish acknowledgement within {0:?}")]
    Timeout(Duration),
}

/// Invalid run parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A run must publish at least one message.
    #[error("message count must be greater than zero")]
    ZeroCount,

    /// Broker address is empty.
    #[error("broker address must not be empty")]
    EmptyBroker,

    /// Topic is empty.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// Publish timeout is zero.
    #[error("publish timeout must be greater than zero")]
    ZeroPublishTimeout,

    /// Connect timeout is zero.
    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    /// QoS ordinal outside of 0..=2.
    #[error("invalid QoS level {0}, expected 0, 1 or 2")]
    InvalidQoS(u8),
}

/// Errors raised while recording or merging latency histograms.
#[derive(Debug, Error)]
pub enum HistogramError {
    /// The latency does not fit into the histogram's value range.
    #[error("latency {latency:?} is too large to record")]
    LatencyTooLarge {
        /// The offending latency.
        latency: Duration,
    },

    /// Recording into the histogram failed.
    #[error("failed to record latency: {0}")]
    Record(#[from] hdrhistogram::RecordError),

    /// Merging two histograms failed.
    #[error("failed to merge histograms: {0}")]
    Merge(#[from] hdrhistogram::AdditionError),
}
