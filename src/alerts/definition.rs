//! Alert definition files
//!
//! A definition file is a handful of `key=value` lines:
//!
//! ```text
//! # fired when the batch queue backs up
//! name="queue-depth"
//! interval="5m"
//! data=1200
//! ```
//!
//! Blank lines and `#` comments are ignored. `name`, `interval` and `data`
//! are required; once all three were seen the rest of the file is not read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::AlertParseError;

/// Extension of alert definition files
pub const ALERT_FILE_EXTENSION: &str = "mm";

/// Shortest interval an alert may request
pub const MIN_ALERT_INTERVAL: Duration = Duration::from_secs(60);

/// Scalar carried by an alert, typed once when the file is parsed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AlertValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl AlertValue {
    /// Infer the type of a raw `data` value.
    ///
    /// Quoted values are text; otherwise integer, then float, then raw text.
    pub fn infer(raw: &str) -> Self {
        if raw.starts_with('"') && raw.ends_with('"') {
            return AlertValue::Text(raw.trim_matches('"').to_string());
        }

        if let Ok(integer) = raw.parse::<i64>() {
            return AlertValue::Integer(integer);
        }

        // non-finite floats have no JSON representation
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => AlertValue::Float(float),
            _ => AlertValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for AlertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertValue::Text(text) => write!(f, "{text:?}"),
            AlertValue::Integer(integer) => write!(f, "{integer}"),
            AlertValue::Float(float) => write!(f, "{float}"),
        }
    }
}

/// One named, timed custom signal
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDefinition {
    /// File the alert was read from; identifies the alert across reloads
    pub path: PathBuf,
    pub name: String,
    pub interval: Duration,
    pub value: AlertValue,
    /// Last time the alert was handed to the dispatcher
    pub last_sent: Option<DateTime<Utc>>,
}

impl AlertDefinition {
    /// Parse the contents of a definition file
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, AlertParseError> {
        let path = path.into();

        let mut name = None;
        let mut interval = None;
        let mut value = None;

        for line in content.lines() {
            if name.is_some() && interval.is_some() && value.is_some() {
                break;
            }

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, raw)) = line.split_once('=') else {
                continue;
            };
            let raw = raw.trim();

            match key.trim() {
                "name" => {
                    name = Some(raw.trim_matches('"').to_string()).filter(|name| !name.is_empty());
                }
                "interval" => {
                    let requested = parse_interval(raw.trim_matches('"'))?;
                    if requested < MIN_ALERT_INTERVAL {
                        warn!(
                            "interval for {} is less than minimum, using {:?} instead",
                            path.display(),
                            MIN_ALERT_INTERVAL
                        );
                    }
                    interval = Some(requested.max(MIN_ALERT_INTERVAL));
                }
                "data" => value = Some(AlertValue::infer(raw)),
                _ => {}
            }
        }

        Ok(Self {
            name: name.ok_or(AlertParseError::MissingName)?,
            interval: interval.ok_or(AlertParseError::MissingInterval)?,
            value: value.ok_or(AlertParseError::MissingData)?,
            path,
            last_sent: None,
        })
    }

    /// Whether the alert's interval has elapsed since it was last sent
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(last_sent) = self.last_sent else {
            return true;
        };

        let interval = TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(last_sent) >= interval
    }
}

/// Read and parse a definition file
pub async fn parse_alert_file(path: &Path) -> Result<AlertDefinition, AlertParseError> {
    let content = tokio::fs::read_to_string(path).await?;
    AlertDefinition::parse(path, &content)
}

static SHORT_INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(ms|s|m|hrs|hr|h|d)$").expect("valid regex"));

static DURATION_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)((?:(?:\d+(?:\.\d*)?|\.\d+)(?:ns|us|µs|μs|ms|s|m|h))+)$")
        .expect("valid regex")
});

static DURATION_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|s|m|h)").expect("valid regex")
});

/// Parse an alert interval.
///
/// Accepts `<int><unit>` with unit one of `ms`, `s`, `m`, `h`/`hr`/`hrs`, `d`,
/// or a compound expression such as `1h30m` or `1.5h`. Negative expressions
/// parse to zero.
pub fn parse_interval(raw: &str) -> Result<Duration, AlertParseError> {
    let invalid = || AlertParseError::InvalidInterval(raw.to_string());
    let raw_trimmed = raw.trim();

    if let Some(captures) = SHORT_INTERVAL.captures(raw_trimmed) {
        let amount: u64 = captures[1].parse().map_err(|_| invalid())?;
        let duration = match &captures[2] {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" | "hr" | "hrs" => amount.checked_mul(60 * 60).map(Duration::from_secs),
            "d" => amount.checked_mul(24 * 60 * 60).map(Duration::from_secs),
            _ => None,
        };
        return duration.ok_or_else(invalid);
    }

    if raw_trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let captures = DURATION_EXPR.captures(raw_trimmed).ok_or_else(invalid)?;
    if &captures[1] == "-" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0.0_f64;
    for term in DURATION_TERM.captures_iter(&captures[2]) {
        let amount: f64 = term[1].parse().map_err(|_| invalid())?;
        let unit = match &term[2] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            _ => 3600.0,
        };
        total += amount * unit;
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}
