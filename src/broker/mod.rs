//! The broker connection capability.
//!
//! The wire protocol lives outside of this crate. A [`BrokerClient`] wraps
//! whatever client library speaks it and exposes the four operations a run
//! needs: connect, publish with acknowledgement, disconnect, and background
//! reconnect with a loss notification.
//!
//! Bounded waits are applied by the caller, so implementations may simply
//! await the acknowledgement; a dropped future means the caller gave up.
pub mod sim;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

pub use sim::SimBroker;

use crate::{
    config::{ClientConfig, Credentials, QoS},
    error::{ConnectError, PublishError},
};

/// Listener invoked by the client library when the connection drops.
///
/// It must not block: the library keeps reconnecting in the background.
pub type ConnectionLostHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Parameters for establishing a broker session.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Broker address.
    pub broker: String,
    /// Unique session identifier.
    pub client_id: String,
    /// Optional credentials.
    pub credentials: Option<Credentials>,
    /// Start without any stored session state.
    pub clean_session: bool,
    /// Reconnect in the background when the connection drops.
    pub auto_reconnect: bool,
    /// Called with the loss reason every time the connection drops.
    pub on_connection_lost: Option<ConnectionLostHandler>,
}

impl ConnectOptions {
    /// Options for the given run: clean session, auto-reconnect, fresh session id.
    pub fn for_client(config: &ClientConfig) -> Self {
        Self {
            broker: config.broker.clone(),
            client_id: config.session_id(),
            credentials: config.credentials.clone(),
            clean_session: true,
            auto_reconnect: true,
            on_connection_lost: None,
        }
    }

    /// Registers the connection-lost listener.
    pub fn on_connection_lost(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_connection_lost = Some(Arc::new(handler));
        self
    }

    pub(crate) fn notify_lost(&self, reason: &str) {
        if let Some(handler) = &self.on_connection_lost {
            handler(reason);
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("username", &self.credentials.as_ref().map(|c| &c.username))
            .field("clean_session", &self.clean_session)
            .field("auto_reconnect", &self.auto_reconnect)
            .finish_non_exhaustive()
    }
}

/// A connection to the broker under test.
///
/// Each run owns exactly one client value; no other task touches it.
#[async_trait]
pub trait BrokerClient: Send + 'static {
    /// Establish the session and wait for the broker's acknowledgement.
    async fn connect(&mut self, opts: ConnectOptions) -> Result<(), ConnectError>;

    /// Publish one message and wait until it is acknowledged (or, for QoS 0,
    /// handed to the transport).
    async fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError>;

    /// Whether the session is currently up.
    fn is_connected(&self) -> bool;

    /// Close the session, waiting at most `grace` for in-flight work.
    async fn disconnect(&mut self, grace: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_options_for_client() {
        let cfg = ClientConfig::new(3, "tcp://b:1883", "/t")
            .with_credentials(Credentials::from_parts(Some("u".into()), Some("secret".into())));
        let opts = ConnectOptions::for_client(&cfg);
        assert_eq!(opts.broker, "tcp://b:1883");
        assert!(opts.clean_session && opts.auto_reconnect);
        assert!(opts.client_id.ends_with("-3"));

        let debug = format!("{opts:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_notify_lost_calls_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let opts = ConnectOptions::for_client(&ClientConfig::new(0, "b", "/t")).on_connection_lost(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        opts.notify_lost("eof");
        opts.notify_lost("eof");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
