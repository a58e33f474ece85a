//! Cold-restart supervisor
//!
//! The agent body runs on its own task. When it returns an error or panics,
//! the failure is logged, the supervisor waits a fixed cool-down and builds a
//! completely fresh body from the factory. Nothing survives a restart.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Wait before the agent is rebuilt after a failure
pub const RESTART_COOLDOWN: Duration = Duration::from_secs(10);

/// Log every panic with a captured backtrace, regardless of `RUST_BACKTRACE`
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        error!("recovered from panic: {info}\n{backtrace}");
    }));
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    cooldown: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(RESTART_COOLDOWN)
    }
}

impl Supervisor {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Run bodies built by `factory` until one returns `Ok`
    ///
    /// Returns the number of restarts that were needed.
    pub async fn run<F, Fut>(&self, mut factory: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut restarts = 0;

        loop {
            match tokio::spawn(factory()).await {
                Ok(Ok(())) => {
                    info!("agent stopped");
                    return restarts;
                }
                Ok(Err(e)) => error!("agent failed: {e:?}"),
                Err(e) if e.is_panic() => {
                    error!("agent panicked: {}", panic_message(e.into_panic()));
                }
                Err(e) => error!("agent task was cancelled: {e}"),
            }

            restarts += 1;
            warn!(
                "restarting agent in {:?} (restart {restarts})",
                self.cooldown
            );
            sleep(self.cooldown).await;
        }
    }
}
