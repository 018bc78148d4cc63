//! Paced production of outbound messages.
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Duration},
};

use crate::{
    config::{ClientConfig, QoS},
    message::Message,
};

/// Produces a bounded, evenly paced sequence of messages.
#[derive(Debug, Clone)]
pub struct Generator {
    topic: String,
    qos: QoS,
    payload_size: usize,
    count: u64,
    delay: Duration,
}

impl Generator {
    /// Creates a generator for the given run parameters.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            topic: config.topic.clone(),
            qos: config.qos,
            payload_size: config.payload_size,
            count: config.count,
            delay: config.delay,
        }
    }

    /// Emit `count` messages into `tx`, waiting `delay` between two of them,
    /// then fire `done`.
    ///
    /// Stops early without signalling if the receiving side goes away.
    pub async fn run(self, tx: mpsc::Sender<Message>, done: oneshot::Sender<()>) {
        for i in 0..self.count {
            if i > 0 && !self.delay.is_zero() {
                time::sleep(self.delay).await;
            }
            let msg = Message::new(self.topic.as_str(), self.qos, self.payload_size);
            if tx.send(msg).await.is_err() {
                #[cfg(feature = "logging")]
                log::debug!("generator stopped after {i} messages: publisher is gone");
                return;
            }
        }
        // the publisher may already have finished
        let _ = done.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn generator(count: u64, delay: Duration) -> Generator {
        let cfg = ClientConfig::new(0, "sim://", "/gen")
            .with_count(count)
            .with_delay(delay)
            .with_payload_size(32)
            .with_qos(QoS::ExactlyOnce);
        Generator::new(&cfg)
    }

    #[tokio::test]
    async fn test_emits_exactly_count_messages() {
        let (tx, mut rx) = mpsc::channel(1);
        let (done_tx, mut done_rx) = oneshot::channel();
        tokio::spawn(generator(5, Duration::ZERO).run(tx, done_tx));

        let mut n = 0;
        while let Some(m) = rx.recv().await {
            assert_eq!(m.topic, "/gen");
            assert_eq!(m.qos, QoS::ExactlyOnce);
            assert_eq!(m.payload.len(), 32);
            assert!(m.sent.is_none());
            n += 1;
        }
        assert_eq!(n, 5);
        assert!(done_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_messages() {
        let (tx, mut rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let start = Instant::now();
        tokio::spawn(generator(4, Duration::from_millis(50)).run(tx, done_tx));

        let mut arrivals = Vec::new();
        while rx.recv().await.is_some() {
            arrivals.push(start.elapsed());
        }
        done_rx.await.unwrap();
        assert_eq!(arrivals.len(), 4);
        assert_eq!(arrivals[0], Duration::ZERO);
        assert!(arrivals[3] >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        drop(rx);
        generator(3, Duration::ZERO).run(tx, done_tx).await;
        assert!(done_rx.await.is_err());
    }
}
