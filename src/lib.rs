pub mod actors;
pub mod agent;
pub mod alerts;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod probe;
pub mod providers;
pub mod remote;
pub mod samples;
pub mod scheduler;
pub mod supervisor;
pub mod util;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version reported in every heartbeat and by `--version`
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of the host, sent with the configuration request and every heartbeat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostDetails {
    pub hostid: String,
    pub hostname: String,
    pub uptime: u64,
    pub os: String,
    pub platform: String,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemperatureReading {
    pub sensor_key: String,
    pub temperature: f64,
}

/// One heartbeat as posted to the update endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Measurement {
    /// Unix seconds at which the measurement was taken
    pub heartbeat: i64,
    #[serde(flatten)]
    pub host: HostDetails,
    pub temp: Vec<TemperatureReading>,
    pub load: BTreeMap<String, f64>,
    pub disks: BTreeMap<String, f64>,
    pub memory: f64,
    pub upload: u64,
    pub download: u64,
    pub upload_interval: u64,
    pub download_interval: u64,
    pub services: BTreeMap<String, String>,
    pub agent_ver: String,
}

/// Cumulative network byte counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetTotals {
    pub upload: u64,
    pub download: u64,
}

impl NetTotals {
    /// Bytes moved since `previous`, zero if a counter went backwards
    pub fn since(&self, previous: NetTotals) -> NetTotals {
        NetTotals {
            upload: self.upload.saturating_sub(previous.upload),
            download: self.download.saturating_sub(previous.download),
        }
    }
}
