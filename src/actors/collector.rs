//! ProcessCollectorActor - Refreshes the shared sample store
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → SampleStore::collect(top_n) → tables swapped
//!     ↑
//!     └─── Commands (CollectNow, Shutdown)
//! ```
//!
//! Collection failures are logged and leave the previous tables in place.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, trace, warn};

use crate::samples::SampleStore;

use super::messages::CollectorCommand;

/// Actor that periodically refreshes the process sample store
pub struct ProcessCollectorActor {
    /// Store the fresh tables are swapped into
    store: Arc<SampleStore>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<CollectorCommand>,

    /// Collection period
    interval_duration: Duration,

    /// Rows kept per table
    top_n: usize,
}

impl ProcessCollectorActor {
    pub fn new(
        store: Arc<SampleStore>,
        command_rx: mpsc::Receiver<CollectorCommand>,
        interval_duration: Duration,
        top_n: usize,
    ) -> Self {
        Self {
            store,
            command_rx,
            interval_duration,
            top_n,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first tick is one full period away; startup collection is done by
    /// the agent itself. Runs until Shutdown or until every handle is dropped.
    #[instrument(skip(self), fields(period = ?self.interval_duration))]
    pub async fn run(mut self) {
        debug!("starting process collector actor");

        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.store.collect(self.top_n).await {
                        Ok(()) => trace!("process data updated"),
                        Err(e) => error!("error collecting processes: {e}"),
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(CollectorCommand::CollectNow { respond_to }) => {
                            debug!("received CollectNow command");
                            let result = self.store.collect(self.top_n).await;
                            let _ = respond_to.send(result);
                        }

                        Some(CollectorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("every handle dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("process collector actor stopped");
    }
}

/// Handle for controlling a ProcessCollectorActor
#[derive(Clone)]
pub struct CollectorHandle {
    sender: mpsc::Sender<CollectorCommand>,
}

impl CollectorHandle {
    /// Spawn a new collector actor
    pub fn spawn(store: Arc<SampleStore>, period: Duration, top_n: usize) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = ProcessCollectorActor::new(store, cmd_rx, period, top_n);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Collect immediately and wait for the result
    pub async fn collect_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::CollectNow { respond_to: tx })
            .await
            .context("failed to send CollectNow command")?;

        rx.await.context("failed to receive response")??;
        Ok(())
    }

    /// Stop the collector
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(CollectorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
