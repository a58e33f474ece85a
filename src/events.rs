//! Event payloads sent to the collector
//!
//! Events are ephemeral: built from the current state, handed to the
//! dispatcher once and dropped. Nothing here is queued or retried.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alerts::AlertValue;
use crate::samples::{ProcessSample, SampleKind};

/// Events endpoint, relative to the collector's base URL
pub const EVENTS_PATH: &str = "/api/events/";

/// Custom alerts endpoint, relative to the collector's base URL
pub const CUSTOM_EVENTS_PATH: &str = "/api/custom-events/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OpenPorts,
    ProcessesCpu,
    ProcessesMem,
}

impl EventType {
    pub fn for_samples(kind: SampleKind) -> Self {
        match kind {
            SampleKind::Cpu => EventType::ProcessesCpu,
            SampleKind::Memory => EventType::ProcessesMem,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::OpenPorts => "open_ports",
            EventType::ProcessesCpu => "processes_cpu",
            EventType::ProcessesMem => "processes_mem",
        }
    }
}

/// One port found listening on a non-loopback address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Result of one open-port scan, each list sorted by port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPorts {
    pub tcp: Vec<PortRecord>,
    pub udp: Vec<PortRecord>,
}

/// Generic event envelope posted to the events endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "Hostid")]
    pub host_id: String,
    #[serde(rename = "EventType")]
    pub event_type: EventType,
    #[serde(rename = "EventData")]
    pub data: Value,
}

impl EventEnvelope {
    pub fn open_ports(host_id: impl Into<String>, ports: &OpenPorts) -> serde_json::Result<Self> {
        Ok(Self {
            host_id: host_id.into(),
            event_type: EventType::OpenPorts,
            data: serde_json::to_value(ports)?,
        })
    }

    pub fn processes(
        host_id: impl Into<String>,
        kind: SampleKind,
        samples: &[ProcessSample],
    ) -> serde_json::Result<Self> {
        Ok(Self {
            host_id: host_id.into(),
            event_type: EventType::for_samples(kind),
            data: serde_json::to_value(samples)?,
        })
    }
}

/// Custom alert payload posted to the custom events endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomAlert {
    pub host_id: String,
    pub name: String,
    pub value: AlertValue,
}

/// Anything the dispatcher can deliver
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Envelope(EventEnvelope),
    CustomAlert(CustomAlert),
}

impl DispatchEvent {
    pub fn path(&self) -> &'static str {
        match self {
            DispatchEvent::Envelope(_) => EVENTS_PATH,
            DispatchEvent::CustomAlert(_) => CUSTOM_EVENTS_PATH,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            DispatchEvent::Envelope(envelope) => serde_json::to_vec(envelope),
            DispatchEvent::CustomAlert(alert) => serde_json::to_vec(alert),
        }
    }
}

impl fmt::Display for DispatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchEvent::Envelope(envelope) => {
                write!(f, "{} event", envelope.event_type.as_str())
            }
            DispatchEvent::CustomAlert(alert) => write!(f, "custom alert '{}'", alert.name),
        }
    }
}

impl From<EventEnvelope> for DispatchEvent {
    fn from(envelope: EventEnvelope) -> Self {
        DispatchEvent::Envelope(envelope)
    }
}

impl From<CustomAlert> for DispatchEvent {
    fn from(alert: CustomAlert) -> Self {
        DispatchEvent::CustomAlert(alert)
    }
}
