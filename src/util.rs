use std::path::PathBuf;
use std::time::Duration;

use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

pub const API_KEY: &str = "MONKEY_API_KEY";

pub fn get_token() -> Option<String> {
    std::env::var(API_KEY).ok().filter(|token| !token.is_empty())
}

const BASE_URL: &str = "MONKEY_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://monitormonkey.io";

pub fn get_base_url() -> String {
    std::env::var(BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

pub const ALERTS_DIR: &str = "MONKEY_CUSTOM_ALERTS_DIR";

const DEFAULT_ALERTS_DIR: &str = "/opt/monitor-monkey/custom-events/";

pub fn get_alerts_dir() -> PathBuf {
    std::env::var(ALERTS_DIR)
        .ok()
        .filter(|dir| !dir.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_ALERTS_DIR), PathBuf::from)
}

/// Read a period in whole seconds from the environment.
///
/// Missing variables fall back silently, unusable ones with a warning.
pub fn get_secs(var: &str, default: Duration) -> Duration {
    let Ok(raw) = std::env::var(var) else {
        return default;
    };

    match parse_secs(&raw) {
        Some(period) => {
            info!("using custom {var}: {} seconds", period.as_secs());
            period
        }
        None => {
            warn!("ignoring {var}={raw:?}, expected a positive number of seconds");
            default
        }
    }
}

fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

const LOG_LEVEL: &str = "MONKEY_LOG";

/// Verbosity of the agent's own log targets, `trace` unless overridden
pub fn get_log_level() -> LevelFilter {
    std::env::var(LOG_LEVEL)
        .ok()
        .and_then(|level| level.trim().parse().ok())
        .unwrap_or(LevelFilter::TRACE)
}
