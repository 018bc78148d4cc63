//! Run parameters of a single simulated client.
use std::time::Duration;

use serde::Serialize;
use strum::{Display, FromRepr};

use crate::error::ConfigError;

/// Maximum wait for the broker to acknowledge the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery guarantee requested for each publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, FromRepr, Serialize)]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget.
    #[strum(to_string = "at-most-once")]
    AtMostOnce = 0,
    /// Acknowledged delivery, duplicates possible.
    #[default]
    #[strum(to_string = "at-least-once")]
    AtLeastOnce = 1,
    /// Four-way handshake, no duplicates.
    #[strum(to_string = "exactly-once")]
    ExactlyOnce = 2,
}

impl QoS {
    /// Returns the protocol ordinal of this level.
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for QoS {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        QoS::from_repr(level).ok_or(ConfigError::InvalidQoS(level))
    }
}

/// Username and password presented to the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Builds credentials only when both parts are non-empty.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self { username, password })
            }
            _ => None,
        }
    }
}

/// Immutable parameters of one client run.
///
/// The generator emits exactly `count` messages and the publisher stops after
/// publishing exactly `count` messages. Both read the same field, so the two
/// numbers can never diverge.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Client identifier, unique within a benchmark.
    pub id: u32,
    /// Broker address, e.g. `tcp://localhost:1883`.
    pub broker: String,
    /// Optional broker credentials.
    pub credentials: Option<Credentials>,
    /// Topic every message is published to.
    pub topic: String,
    /// Payload size in bytes.
    pub payload_size: usize,
    /// Number of messages to publish.
    pub count: u64,
    /// Maximum wait for a publish acknowledgement.
    pub publish_timeout: Duration,
    /// Pause between two generated messages.
    pub delay: Duration,
    /// Maximum wait for the connection to be established.
    pub connect_timeout: Duration,
    /// Delivery guarantee.
    pub qos: QoS,
    /// Suppress informational log lines.
    pub quiet: bool,
}

impl ClientConfig {
    /// Creates a config with default pacing and payload parameters.
    pub fn new(id: u32, broker: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id,
            broker: broker.into(),
            credentials: None,
            topic: topic.into(),
            payload_size: 100,
            count: 100,
            publish_timeout: Duration::from_secs(5),
            delay: Duration::ZERO,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            qos: QoS::default(),
            quiet: false,
        }
    }

    /// Sets the broker credentials.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the payload size in bytes.
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Sets the number of messages.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Sets the per-publish timeout.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Sets the delay between generated messages.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the QoS level.
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Enables or disables quiet mode.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Checks the parameters a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if self.broker.trim().is_empty() {
            return Err(ConfigError::EmptyBroker);
        }
        if self.topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.publish_timeout.is_zero() {
            return Err(ConfigError::ZeroPublishTimeout);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        Ok(())
    }

    /// Session identifier presented to the broker.
    ///
    /// Includes the current time so that repeated runs with the same client id
    /// never collide with a lingering session on the broker side.
    pub fn session_id(&self) -> String {
        let now = chrono::Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
        format!("pubload-{nanos}-{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(7, "tcp://localhost:1883", "/test")
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = config();
        assert_eq!(cfg.qos, QoS::AtLeastOnce);
        assert_eq!(cfg.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert_eq!(config().with_count(0).validate(), Err(ConfigError::ZeroCount));
        assert_eq!(
            ClientConfig::new(0, " ", "/t").validate(),
            Err(ConfigError::EmptyBroker)
        );
        assert_eq!(
            ClientConfig::new(0, "tcp://b", "").validate(),
            Err(ConfigError::EmptyTopic)
        );
        assert_eq!(
            config().with_publish_timeout(Duration::ZERO).validate(),
            Err(ConfigError::ZeroPublishTimeout)
        );
        assert_eq!(
            config().with_connect_timeout(Duration::ZERO).validate(),
            Err(ConfigError::ZeroConnectTimeout)
        );
    }

    #[test]
    fn test_zero_delay_and_payload_are_allowed() {
        let cfg = config().with_delay(Duration::ZERO).with_payload_size(0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_qos_conversion() {
        assert_eq!(QoS::try_from(0), Ok(QoS::AtMostOnce));
        assert_eq!(QoS::try_from(2), Ok(QoS::ExactlyOnce));
        assert_eq!(QoS::try_from(3), Err(ConfigError::InvalidQoS(3)));
        assert_eq!(QoS::ExactlyOnce.level(), 2);
        assert_eq!(QoS::AtMostOnce.to_string(), "at-most-once");
    }

    #[test]
    fn test_credentials_need_both_parts() {
        assert!(Credentials::from_parts(Some("u".into()), None).is_none());
        assert!(Credentials::from_parts(Some("u".into()), Some("".into())).is_none());
        let creds = Credentials::from_parts(Some("u".into()), Some("p".into())).unwrap();
        assert_eq!(creds.username, "u");
    }

    #[test]
    fn test_session_id_carries_client_id() {
        let id = config().session_id();
        assert!(id.starts_with("pubload-"));
        assert!(id.ends_with("-7"));
    }
}
