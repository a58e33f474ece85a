//! Message types for actor communication
//!
//! Each background actor is driven by an mpsc command channel. Requests that
//! need an answer carry a oneshot sender for the reply.

use tokio::sync::oneshot;

use crate::error::SampleError;

/// Commands that can be sent to a ProcessCollectorActor
#[derive(Debug)]
pub enum CollectorCommand {
    /// Collect immediately, bypassing the interval timer
    CollectNow {
        respond_to: oneshot::Sender<Result<(), SampleError>>,
    },

    /// Stop the collector
    Shutdown,
}

/// Commands that can be sent to an AlertMonitorActor
#[derive(Debug)]
pub enum AlertCommand {
    /// Reload the directory and dispatch every due alert now
    ///
    /// Replies with the number of alerts handed to the dispatcher.
    CheckNow { respond_to: oneshot::Sender<usize> },

    /// Stop the check loop
    Shutdown,
}
