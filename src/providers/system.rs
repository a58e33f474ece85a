//! Host identity and resource readings via `sysinfo`

use std::collections::{BTreeMap, HashSet};
use std::net::UdpSocket;
use std::path::Path;

use async_trait::async_trait;
use sysinfo::{Components, Disks, Networks, System};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::{HostDetails, NetTotals, TemperatureReading};

use super::HostProvider;

/// Files holding a stable machine identifier, most preferred first
const MACHINE_ID_FILES: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Filesystems that never back a physical disk
const SPECIAL_FILESYSTEMS: [&str; 20] = [
    "devfs",
    "tmpfs",
    "devtmpfs",
    "proc",
    "sysfs",
    "debugfs",
    "cgroup",
    "cgroup2",
    "securityfs",
    "fusectl",
    "pstore",
    "bpf",
    "hugetlbfs",
    "squashfs",
    "overlay",
    "fuse",
    "ecryptfs",
    "autofs",
    "mqueue",
    "configfs",
];

/// Reported when no disk qualifies
const FALLBACK_DISK: &str = "/";

pub fn is_special_fs(fstype: &str) -> bool {
    SPECIAL_FILESYSTEMS.contains(&fstype) || fstype.starts_with("fuse.") || fstype.contains("snap")
}

/// Whole-disk device of a partition (`/dev/sda1` → `/dev/sda`, `/dev/nvme0n1p2` → `/dev/nvme0n1`)
pub fn base_device(device: &str) -> &str {
    let device = device.trim();

    if device.contains("nvme") || device.contains("mmcblk") {
        let without_digits = device.trim_end_matches(|c: char| c.is_ascii_digit());
        if without_digits.len() < device.len()
            && let Some(base) = without_digits.strip_suffix('p')
        {
            return base;
        }
        return device;
    }

    device.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// One mounted filesystem as seen by the disk picker
#[derive(Debug, Clone, PartialEq)]
pub struct MountedDisk {
    pub device: String,
    pub mount_point: String,
    pub file_system: String,
    pub total: u64,
    pub available: u64,
}

impl MountedDisk {
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let used = self.total.saturating_sub(self.available);
        used as f64 / self.total as f64 * 100.0
    }
}

/// Mount points of the `count` fullest physical disks
///
/// Special filesystems and empty mounts are skipped, and only the first mount
/// of each base device counts. Falls back to `/` when nothing qualifies.
pub fn pick_top_disks(disks: &[MountedDisk], count: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&MountedDisk> = disks
        .iter()
        .filter(|disk| !is_special_fs(&disk.file_system) && disk.total > 0)
        .filter(|disk| seen.insert(base_device(&disk.device).to_string()))
        .collect();

    candidates.sort_by(|a, b| b.used_percent().total_cmp(&a.used_percent()));

    let picked: Vec<String> = candidates
        .into_iter()
        .take(count)
        .map(|disk| disk.mount_point.clone())
        .collect();

    if picked.is_empty() {
        vec![FALLBACK_DISK.to_string()]
    } else {
        picked
    }
}

fn mounted_disks() -> Vec<MountedDisk> {
    Disks::new_with_refreshed_list()
        .iter()
        .map(|disk| MountedDisk {
            device: disk.name().to_string_lossy().into_owned(),
            mount_point: disk.mount_point().to_string_lossy().into_owned(),
            file_system: disk.file_system().to_string_lossy().into_owned(),
            total: disk.total_space(),
            available: disk.available_space(),
        })
        .collect()
}

fn is_loopback_interface(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0")
}

fn read_machine_id() -> Option<String> {
    MACHINE_ID_FILES.iter().find_map(|path| {
        std::fs::read_to_string(Path::new(path))
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// Address of the interface used for outbound traffic
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn outbound_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

/// Run a blocking sysinfo or filesystem read on the blocking pool
async fn blocking<T, F>(what: &'static str, read: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Default + Send + 'static,
{
    tokio::task::spawn_blocking(read).await.unwrap_or_else(|e| {
        warn!("reading {what} failed: {e}");
        T::default()
    })
}

/// Provider backed by the local operating system
#[derive(Debug, Clone, Default)]
pub struct SystemProvider;

impl SystemProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostProvider for SystemProvider {
    async fn host_details(&self) -> HostDetails {
        let (machine_id, ip) =
            blocking("host identity", || (read_machine_id(), outbound_ip())).await;

        let hostname = System::host_name().unwrap_or_default();
        let hostid = machine_id.unwrap_or_else(|| {
            warn!("no machine id found, using hostname as host id");
            hostname.clone()
        });

        HostDetails {
            hostid,
            hostname,
            uptime: System::uptime(),
            os: std::env::consts::OS.to_string(),
            platform: System::distribution_id(),
            ip: ip.unwrap_or_default(),
        }
    }

    async fn temperatures(&self) -> Vec<TemperatureReading> {
        blocking("temperatures", || {
            Components::new_with_refreshed_list()
                .iter()
                .filter_map(|component| {
                    component.temperature().map(|temperature| TemperatureReading {
                        sensor_key: component.label().to_string(),
                        temperature: f64::from(temperature),
                    })
                })
                .collect()
        })
        .await
    }

    async fn load(&self) -> BTreeMap<String, f64> {
        let load = System::load_average();

        BTreeMap::from([
            ("load1".to_string(), load.one),
            ("load5".to_string(), load.five),
            ("load15".to_string(), load.fifteen),
        ])
    }

    async fn disk_usage(&self, path: &str) -> f64 {
        blocking("disks", mounted_disks)
            .await
            .into_iter()
            .find(|disk| disk.mount_point == path)
            .map(|disk| disk.used_percent())
            .unwrap_or_else(|| {
                debug!("no mounted filesystem at {path}");
                0.0
            })
    }

    async fn memory_used_percent(&self) -> f64 {
        blocking("memory", || {
            let mut sys = System::new();
            sys.refresh_memory();

            match sys.total_memory() {
                0 => 0.0,
                total => sys.used_memory() as f64 / total as f64 * 100.0,
            }
        })
        .await
    }

    async fn net_totals(&self) -> NetTotals {
        blocking("network totals", || {
            Networks::new_with_refreshed_list()
                .iter()
                .filter(|(name, _)| !is_loopback_interface(name))
                .fold(NetTotals::default(), |totals, (_, data)| NetTotals {
                    upload: totals.upload.saturating_add(data.total_transmitted()),
                    download: totals.download.saturating_add(data.total_received()),
                })
        })
        .await
    }

    #[instrument(skip(self))]
    async fn service_status(&self, name: &str) -> String {
        match Command::new("systemctl")
            .args(["is-active", name])
            .output()
            .await
        {
            // is-active exits non-zero for inactive units but still prints the state
            Ok(output) => {
                let status = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if status.is_empty() {
                    "unknown".to_string()
                } else {
                    status
                }
            }
            Err(e) => {
                warn!("failed to query service {name}: {e}");
                "unknown".to_string()
            }
        }
    }

    async fn top_used_disks(&self, count: usize) -> Vec<String> {
        pick_top_disks(&blocking("disks", mounted_disks).await, count)
    }
}
