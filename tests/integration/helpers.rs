//! Fake providers and fixtures for integration tests

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use monkey_agent::config::AgentConfig;
use monkey_agent::error::ProviderError;
use monkey_agent::events::{OpenPorts, PortRecord};
use monkey_agent::providers::{HostProvider, PortProvider, ProcessProvider, Providers};
use monkey_agent::samples::{ProcessSample, ProcessUsage, SampleKind};
use monkey_agent::{HostDetails, NetTotals, TemperatureReading};

/// Host with fixed readings and adjustable network counters
pub struct FakeHost {
    pub totals: Mutex<NetTotals>,
}

impl FakeHost {
    pub fn new(upload: u64, download: u64) -> Self {
        Self {
            totals: Mutex::new(NetTotals { upload, download }),
        }
    }

    pub fn set_totals(&self, upload: u64, download: u64) {
        *self.totals.lock().unwrap() = NetTotals { upload, download };
    }
}

#[async_trait]
impl HostProvider for FakeHost {
    async fn host_details(&self) -> HostDetails {
        HostDetails {
            hostid: "host-1".into(),
            hostname: "web-1".into(),
            uptime: 3600,
            os: "linux".into(),
            platform: "debian".into(),
            ip: "10.0.0.2".into(),
        }
    }

    async fn temperatures(&self) -> Vec<TemperatureReading> {
        vec![TemperatureReading {
            sensor_key: "coretemp".into(),
            temperature: 48.0,
        }]
    }

    async fn load(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("load1".to_string(), 0.5),
            ("load5".to_string(), 0.25),
            ("load15".to_string(), 0.1),
        ])
    }

    async fn disk_usage(&self, path: &str) -> f64 {
        match path {
            "/" => 42.0,
            "/data" => 87.5,
            _ => 0.0,
        }
    }

    async fn memory_used_percent(&self) -> f64 {
        61.0
    }

    async fn net_totals(&self) -> NetTotals {
        *self.totals.lock().unwrap()
    }

    async fn service_status(&self, name: &str) -> String {
        let status = if name == "sshd" { "active" } else { "inactive" };
        status.to_string()
    }

    async fn top_used_disks(&self, count: usize) -> Vec<String> {
        ["/data", "/", "/boot"]
            .into_iter()
            .take(count)
            .map(String::from)
            .collect()
    }
}

pub struct FakeProcesses;

#[async_trait]
impl ProcessProvider for FakeProcesses {
    async fn top_processes(
        &self,
        kind: SampleKind,
        top_n: usize,
    ) -> Result<Vec<ProcessSample>, ProviderError> {
        let rows = [(101, "postgres", 30.5, 409_600), (202, "nginx", 2.0, 20_480)];

        Ok(rows
            .into_iter()
            .take(top_n)
            .map(|(pid, name, cpu, rss)| ProcessSample {
                pid,
                name: name.into(),
                username: "app".into(),
                usage: match kind {
                    SampleKind::Cpu => ProcessUsage::CpuPercent(cpu),
                    SampleKind::Memory => ProcessUsage::RssKb(rss),
                },
            })
            .collect())
    }
}

pub struct FakePorts;

#[async_trait]
impl PortProvider for FakePorts {
    async fn open_ports(&self) -> Result<OpenPorts, ProviderError> {
        Ok(OpenPorts {
            tcp: vec![PortRecord {
                port: 22,
                service: Some("ssh".into()),
            }],
            udp: vec![],
        })
    }
}

pub fn fake_providers(host: Arc<FakeHost>) -> Providers {
    Providers {
        host,
        processes: Arc::new(FakeProcesses),
        ports: Arc::new(FakePorts),
    }
}

pub fn test_config(base_url: &str, alerts_dir: &Path) -> AgentConfig {
    let mut config = AgentConfig::new("test-token", base_url).unwrap();
    config.alerts_dir = alerts_dir.to_path_buf();
    config
}

pub fn write_alert(dir: &Path, file: &str, content: &str) {
    std::fs::write(dir.join(file), content).unwrap();
}
