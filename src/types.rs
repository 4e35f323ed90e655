use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One (host, port) pair awaiting a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTask {
    pub host: Arc<str>,
    pub port: u16,
}

impl ScanTask {
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ScanTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bracket IPv6 literals so the output is a valid socket address.
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of probing a single port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub port: u16,
    pub state: PortState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl ScanResult {
    pub fn open(port: u16, banner: Option<String>) -> Self {
        Self {
            port,
            state: PortState::Open,
            banner,
        }
    }

    pub fn closed(port: u16) -> Self {
        Self {
            port,
            state: PortState::Closed,
            banner: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Per-target summary, built once every task for the target has produced a result.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_port: Option<u16>,
    pub ports_scanned: u64,
    pub open_ports: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub time_taken: Duration,
    pub started_at: String,
    /// Open ports only, in arrival order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ScanResult>,
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{d:?}"))
}
