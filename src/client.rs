//! Orchestrates one complete run of a simulated client.
//!
//! A run is three concurrent stages joined by channels:
//!
//! ```text
//! Generator --messages--> Publisher --completed messages--> Client
//!                             \------run completion--------/
//! ```
//!
//! The [`Client`] tallies every completed message and, once the publisher
//! signals completion, reduces the latency samples into a [`RunResult`].
use tokio::{
    select,
    sync::{mpsc, oneshot},
    task::JoinSet,
    time::Instant,
};

use crate::{
    broker::BrokerClient,
    config::ClientConfig,
    generator::Generator,
    publisher::{Publisher, PublisherExit},
    report::{RunOutcome, RunResult},
    stats::Counter,
};

/// A simulated publishing client.
pub struct Client<C> {
    config: ClientConfig,
    broker: C,
}

impl<C: BrokerClient> Client<C> {
    /// Creates a client that will publish through `broker`.
    pub fn new(config: ClientConfig, broker: C) -> Self {
        Self { config, broker }
    }

    /// Runs the pipeline to completion and returns its summary.
    pub async fn run(self) -> RunResult {
        let Self { config, broker } = self;
        let mut result = RunResult::new(config.id, config.count);
        let started = Instant::now();

        // capacity 1 is the closest tokio gets to a rendezvous channel
        let (msg_tx, msg_rx) = mpsc::channel(1);
        let (gen_tx, gen_rx) = oneshot::channel();
        let (out_tx, mut out_rx) = mpsc::channel(1);
        let (done_tx, mut done_rx) = oneshot::channel();

        // dropping the set on return aborts anything still running
        let mut stages = JoinSet::new();
        stages.spawn(Generator::new(&config).run(msg_tx, gen_tx));
        stages.spawn(Publisher::new(config.clone(), broker).run(msg_rx, gen_rx, out_tx, done_tx));

        let mut counter = Counter::default();
        let mut samples = Vec::new();

        let exit = loop {
            select! {
                // drain completed messages before looking at the completion signal
                biased;
                Some(msg) = out_rx.recv() => {
                    counter += &msg;
                    if let Some(latency) = msg.latency() {
                        samples.push(latency.as_secs_f64() * 1000.0);
                        if let Err(_e) = result.hist.record(latency) {
                            #[cfg(feature = "logging")]
                            log::warn!("CLIENT {} dropped a latency sample: {_e}", config.id);
                        }
                    }
                }
                exit = &mut done_rx => break exit,
            }
        };

        let elapsed = started.elapsed();
        let outcome = match &exit {
            Ok(exit) => RunOutcome::from(exit),
            Err(_) => {
                #[cfg(feature = "logging")]
                log::error!("CLIENT {} publisher stopped without signalling completion", config.id);
                RunOutcome::Aborted
            }
        };
        if let Ok(PublisherExit::Finished { published }) = &exit
            && counter.completed() != *published
        {
            #[cfg(feature = "logging")]
            log::warn!(
                "CLIENT {} counted {} of {published} published messages",
                config.id,
                counter.completed()
            );
        }

        result.finalize(counter, &samples, elapsed, outcome)
    }

    /// Runs the pipeline and delivers the result on `results`.
    ///
    /// This is how a launcher running many clients collects their summaries.
    pub async fn run_into(self, results: mpsc::Sender<RunResult>) {
        let result = self.run().await;
        // safe to ignore the error which means the receiver is dropped
        let _ = results.send(result).await;
    }
}
