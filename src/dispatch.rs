//! Event dispatcher
//!
//! Delivers one event per call and classifies the result. Failures are
//! logged and the event is dropped: the next scheduled cycle sends the then
//! current state, so there is no retry queue.
//!
//! ```text
//! scheduler ── spawn(event) ──▶ tokio task ── POST ──▶ collector
//!                                   │
//!                                   └─ 2xx: info!  | other / error: error!, dropped
//! ```

use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::events::DispatchEvent;
use crate::remote::ApiClient;

/// How a delivery attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The collector answered with a 2xx status
    Delivered { status: u16 },

    /// The collector answered with any other status
    Rejected { status: u16, body: String },

    /// The request never got an answer (serialization, connection, timeout)
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Sends events to the collector
#[derive(Debug, Clone)]
pub struct Dispatcher {
    api: ApiClient,
}

impl Dispatcher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Deliver a single event; never retries and never panics on a bad reply
    #[instrument(skip_all, fields(event = %event))]
    pub async fn send(&self, event: &DispatchEvent) -> DispatchOutcome {
        let outcome = self.deliver(event).await;

        match &outcome {
            DispatchOutcome::Delivered { status } => {
                info!("successfully sent {event} ({status})");
            }
            DispatchOutcome::Rejected { status, body } => {
                error!("failed to send {event}. Status: {status}, Response: {body}");
            }
            DispatchOutcome::Failed { reason } => {
                error!("error sending {event}: {reason}");
            }
        }

        outcome
    }

    async fn deliver(&self, event: &DispatchEvent) -> DispatchOutcome {
        let body = match event.to_json() {
            Ok(body) => body,
            Err(e) => {
                return DispatchOutcome::Failed {
                    reason: format!("failed to serialize event: {e}"),
                };
            }
        };

        let response = match self.api.post_bytes(event.path(), body).await {
            Ok(response) => response,
            Err(e) => {
                return DispatchOutcome::Failed {
                    reason: format!("{e:#}"),
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            return DispatchOutcome::Delivered {
                status: status.as_u16(),
            };
        }

        let body = response.text().await.unwrap_or_default();
        DispatchOutcome::Rejected {
            status: status.as_u16(),
            body,
        }
    }

    /// Deliver on a detached task so the caller never waits on the collector
    pub fn spawn(&self, event: impl Into<DispatchEvent>) -> JoinHandle<DispatchOutcome> {
        let dispatcher = self.clone();
        let event = event.into();

        tokio::spawn(async move { dispatcher.send(&event).await })
    }
}
