// Error taxonomy shared by transport, admission control and the VLAN workflow.

use thiserror::Error;

/// Failures opening or driving one remote shell session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("channel closed by device")]
    Closed,
}

impl SessionError {
    /// Short machine-readable tag used in logs and audit events.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::AuthenticationFailed(_) => "auth_failed",
            SessionError::NetworkUnreachable(_) => "network_unreachable",
            SessionError::ProtocolError(_) => "protocol_error",
            SessionError::Timeout(_) => "timeout",
            SessionError::Closed => "closed",
        }
    }
}

/// Rejected user input. Never reaches a device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid MAC address '{0}'")]
    MacAddress(String),
    #[error("invalid port specification '{0}'")]
    PortSpec(String),
    #[error("VLAN id {0} is outside 1-4094 or reserved")]
    VlanId(u16),
    #[error("VLAN name contains unsupported characters or is too long")]
    VlanName,
    #[error("description contains unsupported characters or is too long")]
    Description,
    #[error("no target ports left after exclusions")]
    NoPorts,
}

/// Why per-device admission control refused a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionRejection {
    #[error("device {device} already has {active} active sessions (limit {limit})")]
    DeviceSessionLimit {
        device: String,
        active: usize,
        limit: usize,
    },
    #[error("global session limit reached ({limit})")]
    GlobalSessionLimit { limit: usize },
    #[error("device {device} overloaded, backing off for {remaining_ms} ms")]
    DeviceOverloaded { device: String, remaining_ms: u64 },
    #[error("device {device} command rate {rate}/s exceeds limit {limit}/s")]
    CommandRate {
        device: String,
        rate: usize,
        limit: usize,
    },
}

/// Why the host protection zone refused a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadRejection {
    #[error("system overloaded (critical zone)")]
    Overloaded,
    #[error("system under heavy load and request queue is full")]
    QueueFull,
}
