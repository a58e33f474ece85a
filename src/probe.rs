//! Endpoint liveness probe
//!
//! A bounded TCP reachability check run once at startup. A negative result
//! only produces a warning; the dispatcher keeps trying on its own schedule.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Retry policy of the liveness probe
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    /// Connection attempts before giving up
    pub attempts: u32,

    /// Timeout of a single connection attempt
    pub connect_timeout: Duration,

    /// Wait after the first failed attempt, doubled after each further one
    pub base_backoff: Duration,

    /// Upper bound of a single wait
    pub max_backoff: Duration,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            attempts: 3,
            connect_timeout: Duration::from_secs(5),
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(15),
        }
    }
}

impl Probe {
    /// Wait after failed attempt `attempt` (zero based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Total time spent waiting between attempts when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (0..self.attempts.saturating_sub(1))
            .map(|attempt| self.backoff(attempt))
            .sum()
    }

    /// Whether a TCP connection to the URL's host can be established
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &Url) -> bool {
        let Some(addr) = socket_addr(url) else {
            warn!("could not determine host and port of {url}");
            return false;
        };

        for attempt in 0..self.attempts {
            match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(_stream)) => {
                    info!("successfully connected to {addr}");
                    return true;
                }
                Ok(Err(e)) => {
                    debug!(
                        "could not connect to {addr}: {e} (attempt {}/{})",
                        attempt + 1,
                        self.attempts
                    );
                }
                Err(_) => {
                    debug!(
                        "connecting to {addr} timed out (attempt {}/{})",
                        attempt + 1,
                        self.attempts
                    );
                }
            }

            if attempt + 1 < self.attempts {
                let wait = self.backoff(attempt);
                debug!("waiting {wait:?} before retrying");
                sleep(wait).await;
            }
        }

        warn!("failed to connect to {addr} after {} attempts", self.attempts);
        false
    }
}

/// `host:port` of a URL, using the scheme's well-known port when none is given
fn socket_addr(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;

    // bracket IPv6 literals again for the resolver
    if host.contains(':') && !host.starts_with('[') {
        Some(format!("[{host}]:{port}"))
    } else {
        Some(format!("{host}:{port}"))
    }
}
