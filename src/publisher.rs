//! Owns the broker connection and publishes generated messages.
use tokio::{
    select,
    sync::{mpsc, oneshot},
    time::{self, Duration, Instant},
};

use crate::{
    broker::{BrokerClient, ConnectOptions},
    config::ClientConfig,
    error::{ConnectError, PublishError},
    message::Message,
};

/// Grace period granted to in-flight work on the final disconnect.
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(100);

/// A progress line is logged every this many published messages.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Why the publisher stopped. Sent exactly once as the run-completion signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherExit {
    /// The configured number of messages went through the publish path.
    Finished {
        /// Messages handed downstream.
        published: u64,
    },
    /// The connection could not be established; no message was published.
    ConnectFailed(ConnectError),
    /// The generator went away before the target count was reached.
    InputClosed {
        /// Messages handed downstream before the input closed.
        published: u64,
    },
}

/// The publishing stage of a run.
pub struct Publisher<C> {
    config: ClientConfig,
    client: C,
}

impl<C: BrokerClient> Publisher<C> {
    /// Creates a publisher that will own `client` for the lifetime of the run.
    pub fn new(config: ClientConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Connect, then publish every incoming message until the target count is reached.
    ///
    /// Each input message is emitted on `output` exactly once with its outcome
    /// stamped. `done` fires once, after the last message has been emitted or
    /// right away when the connection cannot be established.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<Message>,
        mut generated: oneshot::Receiver<()>,
        output: mpsc::Sender<Message>,
        done: oneshot::Sender<PublisherExit>,
    ) {
        let exit = match self.connect().await {
            Ok(()) => self.serve(&mut input, &mut generated, &output).await,
            Err(e) => PublisherExit::ConnectFailed(e),
        };
        // safe to ignore the error which means the client is gone
        let _ = done.send(exit);
    }

    async fn connect(&mut self) -> Result<(), ConnectError> {
        let opts = ConnectOptions::for_client(&self.config);
        #[cfg(feature = "logging")]
        let opts = {
            let id = self.config.id;
            opts.on_connection_lost(move |reason| {
                log::warn!("CLIENT {id} lost connection to the broker: {reason}, will reconnect");
            })
        };

        let timeout = self.config.connect_timeout;
        match time::timeout(timeout, self.client.connect(opts)).await {
            Ok(Ok(())) => {
                #[cfg(feature = "logging")]
                if !self.config.quiet {
                    log::info!("CLIENT {} is connected to the broker {}", self.config.id, self.config.broker);
                }
                Ok(())
            }
            Ok(Err(e)) => {
                #[cfg(feature = "logging")]
                log::error!("CLIENT {} had error connecting to the broker: {e}", self.config.id);
                Err(e)
            }
            Err(_) => {
                #[cfg(feature = "logging")]
                log::error!("CLIENT {} timed out connecting to the broker after {timeout:?}", self.config.id);
                Err(ConnectError::Timeout(timeout))
            }
        }
    }

    async fn serve(
        &mut self,
        input: &mut mpsc::Receiver<Message>,
        generated: &mut oneshot::Receiver<()>,
        output: &mpsc::Sender<Message>,
    ) -> PublisherExit {
        let target = self.config.count;
        let mut published = 0;
        let mut generator_done = false;

        loop {
            select! {
                msg = input.recv() => {
                    let Some(mut msg) = msg else {
                        #[cfg(feature = "logging")]
                        log::warn!(
                            "CLIENT {} input closed after {published} of {target} messages",
                            self.config.id
                        );
                        self.disconnect(published).await;
                        return PublisherExit::InputClosed { published };
                    };

                    self.publish(&mut msg).await;
                    // safe to ignore the error which means the receiver is dropped
                    let _ = output.send(msg).await;
                    published += 1;

                    #[cfg(feature = "logging")]
                    if published % PROGRESS_INTERVAL == 0 && published < target && !self.config.quiet {
                        log::info!(
                            "CLIENT {} published {published} messages and keeps publishing...",
                            self.config.id
                        );
                    }

                    if published >= target {
                        self.disconnect(published).await;
                        return PublisherExit::Finished { published };
                    }
                }
                // Termination is driven by the publish count alone.
                _ = &mut *generated, if !generator_done => {
                    generator_done = true;
                    #[cfg(feature = "logging")]
                    if !self.config.quiet {
                        log::info!("CLIENT {} is done generating messages", self.config.id);
                    }
                }
            }
        }
    }

    /// Close the session if it is up, giving up once the grace period is over.
    async fn disconnect(&mut self, _published: u64) {
        if !self.client.is_connected() {
            return;
        }
        let closed = time::timeout(DISCONNECT_GRACE, self.client.disconnect(DISCONNECT_GRACE)).await;
        #[cfg(feature = "logging")]
        match closed {
            Ok(()) => log::info!("CLIENT {} disconnected after publishing {_published} messages", self.config.id),
            Err(_) => log::warn!(
                "CLIENT {} disconnect did not finish within {DISCONNECT_GRACE:?}, dropping the session",
                self.config.id
            ),
        }
        #[cfg(not(feature = "logging"))]
        let _ = closed;
    }

    /// Publish one message and stamp its outcome.
    async fn publish(&mut self, msg: &mut Message) {
        msg.sent = Some(Instant::now());
        match self.send(msg).await {
            Ok(()) => {
                msg.delivered = Some(Instant::now());
                msg.error = false;
            }
            Err(_e) => {
                #[cfg(feature = "logging")]
                match &_e {
                    PublishError::Timeout(_) => {
                        log::warn!("CLIENT {} TIMEOUT while sending message: {_e}", self.config.id)
                    }
                    _ => log::error!("CLIENT {} error sending message: {_e}", self.config.id),
                }
                msg.error = true;
            }
        }
    }

    async fn send(&mut self, msg: &Message) -> Result<(), PublishError> {
        let timeout = self.config.publish_timeout;
        let publish = self.client.publish(&msg.topic, msg.qos, false, &msg.payload);
        time::timeout(timeout, publish)
            .await
            .map_err(|_| PublishError::Timeout(timeout))?
    }
}
