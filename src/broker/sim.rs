//! An in-process broker client with fault injection.
//!
//! [`SimBroker`] answers connects and publishes without any network, which
//! makes it useful for dry runs of the pipeline and for exercising every
//! failure path deterministically:
//!
//! ```
//! use std::time::Duration;
//! use pubload::broker::SimBroker;
//!
//! let broker = SimBroker::new()
//!     .with_latency(Duration::from_micros(200))
//!     .fail_every(10)
//!     .lose_connection_at(50, 5);
//! ```
use std::{future, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BrokerClient, ConnectOptions};
use crate::{
    config::QoS,
    error::{ConnectError, PublishError},
};

/// How the simulated broker answers a connect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Accept the session.
    #[default]
    Accept,
    /// Reject with the given reason.
    Refuse(String),
    /// Never answer.
    Hang,
}

#[derive(Clone, Copy, Debug)]
struct Outage {
    at: u64,
    publishes: u64,
}

/// Counters shared by all clones of a [`SimBroker`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Connect attempts.
    pub connects: u64,
    /// Explicit disconnects.
    pub disconnects: u64,
    /// Publishes that were acknowledged.
    pub published: u64,
    /// Payload bytes of acknowledged publishes.
    pub bytes: u64,
    /// Connection losses.
    pub losses: u64,
}

/// One publish as it reached the simulated broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishRecord {
    /// Destination topic.
    pub topic: String,
    /// Requested delivery guarantee.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
    /// Payload size in bytes.
    pub size: usize,
}

#[derive(Debug, Default)]
struct SimLog {
    connects: Vec<ConnectOptions>,
    publishes: Vec<PublishRecord>,
}

/// A simulated broker client.
///
/// Clones share their [`SimStats`] and publish log but each clone keeps its own session, so one
/// instance per simulated client behaves like an independent connection.
#[derive(Clone, Debug, Default)]
pub struct SimBroker {
    connect: ConnectBehavior,
    latency: Duration,
    fail_every: Option<u64>,
    hang_every: Option<u64>,
    outage: Option<Outage>,
    hang_disconnect: bool,

    stats: Arc<Mutex<SimStats>>,
    log: Arc<Mutex<SimLog>>,
    opts: Option<ConnectOptions>,
    connected: bool,
    link_up: bool,
    outage_left: u64,
    seq: u64,
}

impl SimBroker {
    /// A broker that accepts every connect and acknowledges every publish immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject connects with the given reason.
    pub fn refuse_connect(mut self, reason: impl Into<String>) -> Self {
        self.connect = ConnectBehavior::Refuse(reason.into());
        self
    }

    /// Never answer connects.
    pub fn hang_connect(mut self) -> Self {
        self.connect = ConnectBehavior::Hang;
        self
    }

    /// Delay every acknowledgement by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every `n`-th publish with an explicit error.
    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Never acknowledge every `n`-th publish.
    pub fn hang_every(mut self, n: u64) -> Self {
        self.hang_every = Some(n.max(1));
        self
    }

    /// Drop the connection on the `at`-th publish; that publish and the next
    /// `publishes - 1` ones fail as not connected before the session comes back.
    pub fn lose_connection_at(mut self, at: u64, publishes: u64) -> Self {
        self.outage = Some(Outage { at, publishes: publishes.max(1) });
        self
    }

    /// Never finish disconnects.
    pub fn hang_disconnect(mut self) -> Self {
        self.hang_disconnect = true;
        self
    }

    /// Snapshot of the shared counters.
    pub fn stats(&self) -> SimStats {
        *self.stats.lock()
    }

    /// Every publish issued while connected, in arrival order.
    pub fn publishes(&self) -> Vec<PublishRecord> {
        self.log.lock().publishes.clone()
    }

    /// Options of the most recent connect attempt.
    pub fn last_connect(&self) -> Option<ConnectOptions> {
        self.log.lock().connects.last().cloned()
    }

    fn lose_link(&mut self, reason: &str, outage: u64) {
        self.link_up = false;
        self.outage_left = outage;
        self.stats.lock().losses += 1;
        if let Some(opts) = &self.opts {
            opts.notify_lost(reason);
        }
    }

    fn matches(every: Option<u64>, seq: u64) -> bool {
        every.is_some_and(|n| seq % n == 0)
    }
}

#[async_trait]
impl BrokerClient for SimBroker {
    async fn connect(&mut self, opts: ConnectOptions) -> Result<(), ConnectError> {
        self.stats.lock().connects += 1;
        self.log.lock().connects.push(opts.clone());
        match &self.connect {
            ConnectBehavior::Accept => {
                self.opts = Some(opts);
                self.connected = true;
                self.link_up = true;
                Ok(())
            }
            ConnectBehavior::Refuse(reason) => Err(ConnectError::Refused(reason.clone())),
            ConnectBehavior::Hang => future::pending().await,
        }
    }

    async fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError> {
        if !self.connected {
            return Err(PublishError::NotConnected);
        }
        self.log.lock().publishes.push(PublishRecord {
            topic: topic.to_string(),
            qos,
            retain,
            size: payload.len(),
        });
        self.seq += 1;
        let seq = self.seq;

        if let Some(outage) = self.outage
            && outage.at == seq
        {
            self.lose_link("simulated network failure", outage.publishes);
        }
        if !self.link_up {
            self.outage_left = self.outage_left.saturating_sub(1);
            let reconnect = self.opts.as_ref().is_some_and(|o| o.auto_reconnect);
            if self.outage_left == 0 && reconnect {
                self.link_up = true;
                #[cfg(feature = "logging")]
                log::info!("simulated broker: session restored after {seq} publishes");
            }
            return Err(PublishError::NotConnected);
        }

        if Self::matches(self.hang_every, seq) {
            future::pending::<()>().await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if Self::matches(self.fail_every, seq) {
            return Err(PublishError::Failed(format!("injected failure on publish {seq}")));
        }

        let mut stats = self.stats.lock();
        stats.published += 1;
        stats.bytes += payload.len() as u64;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected && self.link_up
    }

    async fn disconnect(&mut self, _grace: Duration) {
        self.connected = false;
        self.link_up = false;
        self.stats.lock().disconnects += 1;
        if self.hang_disconnect {
            future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn opts() -> ConnectOptions {
        ConnectOptions::for_client(&ClientConfig::new(1, "sim://", "/t"))
    }

    #[tokio::test]
    async fn test_publish_requires_connect() {
        let mut b = SimBroker::new();
        assert_eq!(b.publish("/t", QoS::AtMostOnce, false, b"x").await, Err(PublishError::NotConnected));

        b.connect(opts()).await.unwrap();
        assert!(b.is_connected());
        b.publish("/t", QoS::AtMostOnce, false, b"xyz").await.unwrap();
        b.disconnect(Duration::ZERO).await;
        assert!(!b.is_connected());

        let stats = b.stats();
        assert_eq!((stats.connects, stats.published, stats.bytes, stats.disconnects), (1, 1, 3, 1));
    }

    #[tokio::test]
    async fn test_refused_connect() {
        let mut b = SimBroker::new().refuse_connect("bad credentials");
        let err = b.connect(opts()).await.unwrap_err();
        assert_eq!(err, ConnectError::Refused("bad credentials".into()));
        assert!(!b.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_connect_never_resolves() {
        let mut b = SimBroker::new().hang_connect();
        let res = tokio::time::timeout(Duration::from_secs(1), b.connect(opts())).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_fail_every() {
        let mut b = SimBroker::new().fail_every(2);
        b.connect(opts()).await.unwrap();
        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(b.publish("/t", QoS::AtLeastOnce, false, b"").await.is_ok());
        }
        assert_eq!(results, [true, false, true, false]);
        assert_eq!(b.stats().published, 2);
    }

    #[tokio::test]
    async fn test_connection_loss_fires_listener_and_recovers() {
        let lost = Arc::new(AtomicUsize::new(0));
        let counter = lost.clone();
        let opts = opts().on_connection_lost(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let mut b = SimBroker::new().lose_connection_at(2, 2);
        b.connect(opts).await.unwrap();

        let mut results = Vec::new();
        for _ in 0..5 {
            results.push(b.publish("/t", QoS::AtLeastOnce, false, b"").await);
        }
        assert_eq!(lost.load(Ordering::Relaxed), 1);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(PublishError::NotConnected));
        assert_eq!(results[2], Err(PublishError::NotConnected));
        assert!(results[3].is_ok() && results[4].is_ok());
        assert!(b.is_connected());
        assert_eq!(b.stats().losses, 1);
    }

    #[tokio::test]
    async fn test_records_publishes_and_connects() {
        let b = SimBroker::new();
        let mut c = b.clone();
        assert!(b.last_connect().is_none());
        c.connect(opts()).await.unwrap();
        c.publish("/a", QoS::ExactlyOnce, false, b"xy").await.unwrap();
        c.publish("/b", QoS::AtMostOnce, true, b"").await.unwrap();

        assert!(b.last_connect().unwrap().client_id.ends_with("-1"));
        let records = b.publishes();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            PublishRecord { topic: "/a".into(), qos: QoS::ExactlyOnce, retain: false, size: 2 }
        );
        assert!(records[1].retain);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_disconnect_never_resolves() {
        let mut b = SimBroker::new().hang_disconnect();
        b.connect(opts()).await.unwrap();
        let res = tokio::time::timeout(Duration::from_secs(1), b.disconnect(Duration::ZERO)).await;
        assert!(res.is_err());
        assert_eq!(b.stats().disconnects, 1);
    }

    #[tokio::test]
    async fn test_clones_share_stats() {
        let b = SimBroker::new();
        let mut c1 = b.clone();
        let mut c2 = b.clone();
        c1.connect(opts()).await.unwrap();
        c2.connect(opts()).await.unwrap();
        c1.publish("/t", QoS::AtMostOnce, false, b"").await.unwrap();
        c2.publish("/t", QoS::AtMostOnce, false, b"").await.unwrap();
        assert_eq!(b.stats().published, 2);
        assert_eq!(b.stats().connects, 2);
    }
}
