//! Listening sockets via the kernel's `/proc/net` tables

use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

use crate::error::ProviderError;
use crate::events::{OpenPorts, PortRecord};

use super::PortProvider;

/// `st` column value of a TCP socket in LISTEN state
const TCP_LISTEN: &str = "0A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Port number to service name, per protocol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceNames {
    pub tcp: HashMap<u16, String>,
    pub udp: HashMap<u16, String>,
}

impl ServiceNames {
    fn lookup(&self, protocol: Protocol, port: u16) -> Option<String> {
        let table = match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        };
        table.get(&port).cloned()
    }
}

/// Parse an `/etc/services` style file
///
/// Lines look like `ssh  22/tcp  # comment`. Anything else is ignored. A
/// later entry for the same port wins.
pub fn parse_services(content: &str) -> ServiceNames {
    let mut names = ServiceNames::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((port, proto)) = port_proto.split_once('/') else {
            continue;
        };
        let Ok(port) = port.parse::<u16>() else {
            continue;
        };

        match proto {
            "tcp" => names.tcp.insert(port, name.to_string()),
            "udp" => names.udp.insert(port, name.to_string()),
            _ => None,
        };
    }

    names
}

/// Decode a `local_address` column (`HEXIP:HEXPORT`)
///
/// The kernel prints addresses as native-endian 32-bit words, so the bytes
/// of each word in memory order are the address bytes in network order.
pub fn parse_local_address(field: &str) -> Result<(IpAddr, u16), ProviderError> {
    let malformed = || ProviderError::Malformed {
        what: "local address",
        line: field.to_string(),
    };

    let (ip_hex, port_hex) = field.split_once(':').ok_or_else(malformed)?;
    let port = u16::from_str_radix(port_hex, 16).map_err(|_| malformed())?;

    let words = ip_hex
        .as_bytes()
        .chunks(8)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .filter(|chunk| chunk.len() == 8)
                .and_then(|chunk| u32::from_str_radix(chunk, 16).ok())
                .map(u32::to_ne_bytes)
        })
        .collect::<Option<Vec<[u8; 4]>>>()
        .ok_or_else(malformed)?;

    let ip = match words.as_slice() {
        [v4] => IpAddr::V4(Ipv4Addr::from(*v4)),
        [_, _, _, _] => {
            let mut octets = [0u8; 16];
            for (chunk, word) in octets.chunks_exact_mut(4).zip(&words) {
                chunk.copy_from_slice(word);
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return Err(malformed()),
    };

    Ok((ip, port))
}

fn is_loopback(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Ports bound to a non-loopback address in one socket table
///
/// For TCP only listening sockets count. The header row and rows that do not
/// parse are skipped.
pub fn parse_socket_table(content: &str, protocol: Protocol) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        if protocol == Protocol::Tcp && fields[3] != TCP_LISTEN {
            continue;
        }

        match parse_local_address(fields[1]) {
            Ok((ip, port)) if !is_loopback(&ip) => {
                ports.insert(port);
            }
            Ok(_) => {}
            Err(e) => debug!("skipping socket row: {e}"),
        }
    }

    ports
}

fn records(ports: BTreeSet<u16>, protocol: Protocol, names: &ServiceNames) -> Vec<PortRecord> {
    ports
        .into_iter()
        .map(|port| PortRecord {
            port,
            service: names.lookup(protocol, port),
        })
        .collect()
}

/// Port provider reading `tcp`, `tcp6`, `udp` and `udp6` below a proc directory
#[derive(Debug, Clone)]
pub struct ProcNetPortProvider {
    proc_net: PathBuf,
    services: PathBuf,
}

impl Default for ProcNetPortProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcNetPortProvider {
    pub fn new() -> Self {
        Self::with_paths("/proc/net", "/etc/services")
    }

    pub fn with_paths(proc_net: impl Into<PathBuf>, services: impl Into<PathBuf>) -> Self {
        Self {
            proc_net: proc_net.into(),
            services: services.into(),
        }
    }

    async fn service_names(&self) -> ServiceNames {
        match tokio::fs::read_to_string(&self.services).await {
            Ok(content) => parse_services(&content),
            Err(e) => {
                warn!("could not load {}: {e}", self.services.display());
                ServiceNames::default()
            }
        }
    }

    /// Union of the ports in the given tables; `None` if none was readable
    async fn scan(&self, protocol: Protocol, tables: &[&str]) -> Option<BTreeSet<u16>> {
        let mut ports = BTreeSet::new();
        let mut readable = false;

        for table in tables {
            let path = self.proc_net.join(table);
            match read_table(&path).await {
                Ok(content) => {
                    readable = true;
                    ports.extend(parse_socket_table(&content, protocol));
                }
                Err(e) => error!("{e}"),
            }
        }

        readable.then_some(ports)
    }
}

async fn read_table(path: &Path) -> Result<String, ProviderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProviderError::Unreadable {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl PortProvider for ProcNetPortProvider {
    #[instrument(skip(self))]
    async fn open_ports(&self) -> Result<OpenPorts, ProviderError> {
        let names = self.service_names().await;

        let tcp = self.scan(Protocol::Tcp, &["tcp", "tcp6"]).await;
        let udp = self.scan(Protocol::Udp, &["udp", "udp6"]).await;

        if tcp.is_none() && udp.is_none() {
            return Err(ProviderError::Unavailable(format!(
                "no socket table readable below {}",
                self.proc_net.display()
            )));
        }

        Ok(OpenPorts {
            tcp: records(tcp.unwrap_or_default(), Protocol::Tcp, &names),
            udp: records(udp.unwrap_or_default(), Protocol::Udp, &names),
        })
    }
}
