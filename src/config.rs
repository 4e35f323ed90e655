use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_START_PORT: u16 = 1;
pub const DEFAULT_END_PORT: u16 = 1024;

/// Rejected before any task is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("target list is empty")]
    NoTargets,
    #[error("target at position {0} is blank")]
    BlankTarget(usize),
    #[error("target is blank")]
    EmptyTarget,
    #[error("invalid port range {start}-{end} (start > end)")]
    InvalidRange { start: u16, end: u16 },
    #[error("port 0 is not a valid range bound")]
    PortZero,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Which ports a target sweep dispatches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    Range { start: u16, end: u16 },
    List(Vec<u16>),
}

impl PortSpec {
    /// Number of tasks dispatched per target.
    pub fn len(&self) -> u64 {
        match self {
            PortSpec::Range { start, end } if start <= end => u64::from(*end - *start) + 1,
            PortSpec::Range { .. } => 0,
            PortSpec::List(ports) => ports.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the orchestrator needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub targets: Vec<String>,
    pub start_port: u16,
    pub end_port: u16,
    /// Overrides the range when non-empty.
    pub explicit_ports: Vec<u16>,
    pub workers: usize,
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            start_port: DEFAULT_START_PORT,
            end_port: DEFAULT_END_PORT,
            explicit_ports: Vec::new(),
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ScanConfig {
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_range(mut self, start: u16, end: u16) -> Self {
        self.start_port = start;
        self.end_port = end;
        self
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.explicit_ports = ports;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn port_spec(&self) -> PortSpec {
        if self.explicit_ports.is_empty() {
            PortSpec::Range {
                start: self.start_port,
                end: self.end_port,
            }
        } else {
            PortSpec::List(self.explicit_ports.clone())
        }
    }

    /// Check the whole configuration, targets included.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if let Some(idx) = self.targets.iter().position(|t| t.trim().is_empty()) {
            return Err(ConfigError::BlankTarget(idx));
        }
        self.validate_sweep()
    }

    /// Check the per-target settings only. The range bounds are checked only when no
    /// explicit list overrides them.
    pub fn validate_sweep(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if let PortSpec::Range { start, end } = self.port_spec() {
            if start > end {
                return Err(ConfigError::InvalidRange { start, end });
            }
            if start == 0 {
                return Err(ConfigError::PortZero);
            }
        }
        Ok(())
    }
}
