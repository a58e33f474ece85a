//! OS capability providers
//!
//! The scheduler and stores never touch the operating system directly. They
//! consume these traits, which keeps them testable against fakes.
//!
//! ## Implementations
//!
//! - **SystemProvider**: host identity and resource readings via `sysinfo`
//! - **PsProcessProvider**: top-N process tables via the `ps` utility
//! - **ProcNetPortProvider**: listening sockets via `/proc/net/*`

pub mod ports;
pub mod ps;
pub mod system;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::events::OpenPorts;
use crate::samples::{ProcessSample, SampleKind};
use crate::{HostDetails, NetTotals, TemperatureReading};

pub use ports::ProcNetPortProvider;
pub use ps::PsProcessProvider;
pub use system::SystemProvider;

/// Host identity and resource readings used by the heartbeat
#[async_trait]
pub trait HostProvider: Send + Sync {
    async fn host_details(&self) -> HostDetails;

    async fn temperatures(&self) -> Vec<TemperatureReading>;

    /// Load averages keyed `load1`, `load5`, `load15`
    async fn load(&self) -> BTreeMap<String, f64>;

    /// Used percentage of the filesystem mounted at `path`, `0.0` if unknown
    async fn disk_usage(&self, path: &str) -> f64;

    async fn memory_used_percent(&self) -> f64;

    /// Cumulative counters across all non-loopback interfaces
    async fn net_totals(&self) -> NetTotals;

    /// Liveness string of a system service (`active`, `inactive`, ...)
    async fn service_status(&self, name: &str) -> String;

    /// Mount points of the `count` fullest physical disks
    async fn top_used_disks(&self, count: usize) -> Vec<String>;
}

/// Point-in-time process tables
#[async_trait]
pub trait ProcessProvider: Send + Sync {
    /// Up to `top_n` processes ranked by `kind`, highest first
    async fn top_processes(
        &self,
        kind: SampleKind,
        top_n: usize,
    ) -> Result<Vec<ProcessSample>, ProviderError>;
}

/// Listening sockets of the host
#[async_trait]
pub trait PortProvider: Send + Sync {
    async fn open_ports(&self) -> Result<OpenPorts, ProviderError>;
}

/// Bundle of the capabilities one agent run consumes
#[derive(Clone)]
pub struct Providers {
    pub host: Arc<dyn HostProvider>,
    pub processes: Arc<dyn ProcessProvider>,
    pub ports: Arc<dyn PortProvider>,
}

impl Providers {
    /// Providers backed by the real operating system
    pub fn system() -> Self {
        Self {
            host: Arc::new(SystemProvider::new()),
            processes: Arc::new(PsProcessProvider::new()),
            ports: Arc::new(ProcNetPortProvider::new()),
        }
    }
}
