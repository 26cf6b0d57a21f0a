// Trace outcomes: one per device, plus batch-level terminal signals

use serde::{Deserialize, Serialize};

use super::{Caution, DeviceRef, PortRecord, PortType};

/// Exactly one per requested device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceOutcome {
    Found {
        device: DeviceRef,
        port: String,
        vlan: u16,
        entry_type: String,
        port_type: PortType,
        port_record: PortRecord,
        cautions: Vec<Caution>,
    },
    NotFound {
        device: DeviceRef,
        reason: String,
    },
    ConnectionRejected {
        device: DeviceRef,
        reason: String,
    },
    ConnectionFailed {
        device: DeviceRef,
        error: String,
    },
    AuthFailed {
        device: DeviceRef,
        error: String,
    },
    ProtocolError {
        device: DeviceRef,
        error: String,
    },
    UnexpectedError {
        device: DeviceRef,
        error: String,
    },
}

impl TraceOutcome {
    pub fn device(&self) -> &DeviceRef {
        match self {
            TraceOutcome::Found { device, .. }
            | TraceOutcome::NotFound { device, .. }
            | TraceOutcome::ConnectionRejected { device, .. }
            | TraceOutcome::ConnectionFailed { device, .. }
            | TraceOutcome::AuthFailed { device, .. }
            | TraceOutcome::ProtocolError { device, .. }
            | TraceOutcome::UnexpectedError { device, .. } => device,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TraceOutcome::Found { .. } => "found",
            TraceOutcome::NotFound { .. } => "not_found",
            TraceOutcome::ConnectionRejected { .. } => "connection_rejected",
            TraceOutcome::ConnectionFailed { .. } => "connection_failed",
            TraceOutcome::AuthFailed { .. } => "auth_failed",
            TraceOutcome::ProtocolError { .. } => "protocol_error",
            TraceOutcome::UnexpectedError { .. } => "unexpected_error",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, TraceOutcome::Found { .. })
    }

    /// Presentation order: access hits, uplink hits, misses, then failures.
    pub fn sort_rank(&self) -> u8 {
        match self {
            TraceOutcome::Found {
                port_type: PortType::Access,
                ..
            } => 0,
            TraceOutcome::Found {
                port_type: PortType::Uplink,
                ..
            } => 1,
            TraceOutcome::NotFound { .. } => 2,
            _ => 3,
        }
    }
}

/// Result of one fan-out. Either a complete outcome set or a single terminal signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TraceBatch {
    Completed { outcomes: Vec<TraceOutcome> },
    /// Refused before any device was contacted (group busy, host overloaded).
    Rejected { reason: String },
    TimedOut { timeout_secs: u64 },
}

impl TraceBatch {
    pub fn outcomes(&self) -> &[TraceOutcome] {
        match self {
            TraceBatch::Completed { outcomes } => outcomes,
            _ => &[],
        }
    }
}
