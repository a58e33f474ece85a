use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::error::ConfigError;
use crate::util;

/// Delay between two heartbeats of the primary loop
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Pause after the collector reports the plan's host limit
pub const PLAN_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Number of processes kept per metric kind
pub const TOP_PROCESSES: usize = 10;

/// Number of disks monitored when the collector supplies no list
pub const DEFAULT_DISK_COUNT: usize = 2;

/// Name of the agent's own service, reported by `--status`
pub const AGENT_SERVICE: &str = "monitor-monkey";

pub const PROCESS_COLLECTION_INTERVAL: &str = "PROCESS_COLLECTION_INTERVAL";
pub const PROCESS_SEND_INTERVAL: &str = "PROCESS_SEND_INTERVAL";
pub const OPEN_PORTS_INTERVAL: &str = "OPEN_PORTS_INTERVAL";

fn default_services() -> Vec<String> {
    vec!["sshd".to_string(), AGENT_SERVICE.to_string()]
}

/// Everything the agent needs to know before it starts
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API token sent with every request
    pub token: String,

    /// Root of the collector's API
    pub base_url: Url,

    /// Delay between two heartbeats
    pub heartbeat_interval: Duration,

    /// Pause after a `tomany` reply
    pub plan_limit_backoff: Duration,

    /// Period of the process sample collector
    pub process_collection_interval: Duration,

    /// Period of the process stat report
    pub process_send_interval: Duration,

    /// Period of the open ports report
    pub open_ports_interval: Duration,

    /// Directory scanned for alert definition files
    pub alerts_dir: PathBuf,
}

impl AgentConfig {
    pub fn new(token: impl Into<String>, base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        Ok(Self {
            token: token.into(),
            base_url,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            plan_limit_backoff: PLAN_LIMIT_BACKOFF,
            process_collection_interval: Duration::from_secs(5 * 60),
            process_send_interval: Duration::from_secs(24 * 60 * 60),
            open_ports_interval: Duration::from_secs(24 * 60 * 60),
            alerts_dir: util::get_alerts_dir(),
        })
    }

    /// Build the configuration from the process environment.
    ///
    /// A missing API token is the only fatal condition.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = util::get_token().ok_or(ConfigError::MissingToken(util::API_KEY))?;
        let mut config = Self::new(token, &util::get_base_url())?;

        config.process_collection_interval =
            util::get_secs(PROCESS_COLLECTION_INTERVAL, config.process_collection_interval);
        config.process_send_interval =
            util::get_secs(PROCESS_SEND_INTERVAL, config.process_send_interval);
        config.open_ports_interval = util::get_secs(OPEN_PORTS_INTERVAL, config.open_ports_interval);

        debug!(
            "process monitoring: collection every {:?} | sending every {:?}",
            config.process_collection_interval, config.process_send_interval
        );
        trace!("loaded config: {config:?}");

        Ok(config)
    }

    /// Value of the authorization header
    pub fn auth_header(&self) -> String {
        format!("token {}", self.token)
    }
}

/// Disks and services reported in each heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredResources {
    pub disks: Vec<String>,
    pub services: Vec<String>,
}

impl MonitoredResources {
    /// Defaults used until the collector says otherwise
    pub fn with_disks(disks: Vec<String>) -> Self {
        Self {
            disks,
            services: default_services(),
        }
    }

    /// Apply a host configuration received from the collector.
    ///
    /// Only non-empty lists replace the current ones.
    pub fn apply(&mut self, remote: RemoteConfig) {
        if let Some(disks) = remote.disks.filter(|disks| !disks.is_empty()) {
            debug!("collector supplied disks: {disks:?}");
            self.disks = disks;
        }

        if let Some(services) = remote.services.filter(|services| !services.is_empty()) {
            debug!("collector supplied services: {services:?}");
            self.services = services;
        }
    }
}

/// Host configuration as sent by the collector
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct RemoteConfig {
    #[serde(rename = "Disks", default)]
    pub disks: Option<Vec<String>>,

    #[serde(rename = "Services", default)]
    pub services: Option<Vec<String>>,
}
