//! AlertMonitorActor - Sends user-defined custom alerts
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick ─┐
//!             ├─▶ AlertStore::reload() → AlertStore::due_alerts(now) → Dispatcher::spawn
//! CheckNow  ──┘
//! ```
//!
//! On start the alert directory is created if missing, loaded once, and every
//! loaded alert is sent immediately. After that the directory is re-read and
//! evaluated on each tick, so files can be added, edited or removed while the
//! agent runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

use crate::alerts::{AlertStore, MIN_ALERT_INTERVAL};
use crate::dispatch::Dispatcher;
use crate::events::CustomAlert;

use super::messages::AlertCommand;

/// How often the alert directory is re-evaluated
pub const ALERT_CHECK_INTERVAL: Duration = MIN_ALERT_INTERVAL;

/// Actor that evaluates the alert table and hands due alerts to the dispatcher
pub struct AlertMonitorActor {
    store: Arc<AlertStore>,
    dispatcher: Dispatcher,
    host_id: String,
    command_rx: mpsc::Receiver<AlertCommand>,
    check_interval: Duration,
}

impl AlertMonitorActor {
    pub fn new(
        store: Arc<AlertStore>,
        dispatcher: Dispatcher,
        host_id: String,
        command_rx: mpsc::Receiver<AlertCommand>,
        check_interval: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            host_id,
            command_rx,
            check_interval,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self), fields(dir = %self.store.dir().display()))]
    pub async fn run(mut self) {
        debug!("starting alert monitor actor");

        if let Err(e) = self.store.ensure_dir().await {
            warn!(
                "failed to create alerts directory {}: {e}",
                self.store.dir().display()
            );
        }

        let sent = self.check().await;
        info!("sent {sent} custom alerts on startup");

        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(AlertCommand::CheckNow { respond_to }) => {
                            debug!("received CheckNow command");
                            let sent = self.check().await;
                            let _ = respond_to.send(sent);
                        }

                        Some(AlertCommand::Shutdown) => {
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

        debug!("alert monitor actor stopped");
    }

    /// Reload the directory and dispatch every due alert
    ///
    /// Returns the number of alerts handed to the dispatcher.
    async fn check(&self) -> usize {
        let report = self.store.reload().await;
        if !report.rejected.is_empty() {
            debug!("{} alert files rejected", report.rejected.len());
        }

        let due = self.store.due_alerts(Utc::now()).await;
        let count = due.len();

        for alert in due {
            debug!("sending alert {} = {}", alert.name, alert.value);
            self.dispatcher.spawn(CustomAlert {
                host_id: self.host_id.clone(),
                name: alert.name,
                value: alert.value,
            });
        }

        count
    }
}

/// Handle for controlling an AlertMonitorActor
#[derive(Clone)]
pub struct AlertMonitorHandle {
    sender: mpsc::Sender<AlertCommand>,
}

impl AlertMonitorHandle {
    /// Spawn a new alert monitor checking every `check_interval`
    pub fn spawn(
        store: Arc<AlertStore>,
        dispatcher: Dispatcher,
        host_id: impl Into<String>,
        check_interval: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor =
            AlertMonitorActor::new(store, dispatcher, host_id.into(), cmd_rx, check_interval);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Evaluate the alert table now; returns how many alerts were dispatched
    pub async fn check_now(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::CheckNow { respond_to: tx })
            .await
            .context("failed to send CheckNow command")?;

        rx.await.context("failed to receive response")
    }

    /// Stop the check loop
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(AlertCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
