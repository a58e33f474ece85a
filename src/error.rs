//! Error types shared across the agent
//!
//! Each seam of the agent reports its own failure type so callers can decide
//! whether a failure is skippable (parse errors, transient provider errors)
//! or fatal (missing configuration).

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by an OS capability provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An external utility could not be started
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external utility exited unsuccessfully without producing output
    #[error("`{command}` failed: {status}")]
    CommandFailed { command: String, status: String },

    /// A kernel table or system file could not be read
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// None of the sources for a reading were available
    #[error("no data source available: {0}")]
    Unavailable(String),

    /// A single unit of provider output could not be parsed
    #[error("malformed {what}: {line}")]
    Malformed { what: &'static str, line: String },
}

/// Reasons an alert definition file is rejected
#[derive(Debug, Error)]
pub enum AlertParseError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing name field")]
    MissingName,

    #[error("missing or invalid interval field")]
    MissingInterval,

    #[error("missing data field")]
    MissingData,

    #[error("invalid interval format: {0:?}")]
    InvalidInterval(String),
}

/// Failures of the shared sample store
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no {0} process data collected yet")]
    NoData(&'static str),

    #[error("process collection failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Fatal configuration problems detected before the agent starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingToken(&'static str),

    #[error("invalid collector base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
