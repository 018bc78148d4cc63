//! The unit of work flowing through the pipeline.
use tokio::time::{Duration, Instant};

use crate::config::QoS;

/// A message to be published.
///
/// Created by the generator with timestamps unset, stamped once by the
/// publisher, then read once by the client when it tallies the outcome.
#[derive(Debug, Clone)]
pub struct Message {
    /// Destination topic.
    pub topic: String,
    /// Requested delivery guarantee.
    pub qos: QoS,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// When the publish was issued.
    pub sent: Option<Instant>,
    /// When the publish was acknowledged.
    pub delivered: Option<Instant>,
    /// Whether the publish failed or timed out.
    pub error: bool,
}

impl Message {
    /// Creates an unsent message with a zeroed payload of `size` bytes.
    pub fn new(topic: impl Into<String>, qos: QoS, size: usize) -> Self {
        Self {
            topic: topic.into(),
            qos,
            payload: vec![0; size],
            sent: None,
            delivered: None,
            error: false,
        }
    }

    /// Delivery latency, available only for successfully delivered messages.
    pub fn latency(&self) -> Option<Duration> {
        match (self.error, self.sent, self.delivered) {
            (false, Some(sent), Some(delivered)) => Some(delivered.saturating_duration_since(sent)),
            _ => None,
        }
    }
}
