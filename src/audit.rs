// Audit events: fire-and-forget sink, drained by a writer task that logs JSON lines

use serde::Serialize;
use tokio::sync::mpsc;

/// Log target the writer emits on. Route it to its own file via `RUST_LOG`/subscriber config.
pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    TraceStarted {
        caller: String,
        group: String,
        mac: String,
        devices: usize,
    },
    TraceCompleted {
        caller: String,
        group: String,
        mac: String,
        found: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    TraceTimedOut {
        caller: String,
        group: String,
        mac: String,
        timeout_secs: u64,
    },
    TraceRejected {
        caller: String,
        group: String,
        mac: String,
        reason: String,
    },
    VlanChangeApplied {
        caller: String,
        device: String,
        vlan_id: u16,
        ports_changed: Vec<String>,
        ports_failed: Vec<String>,
    },
    VlanChangeFailed {
        caller: String,
        device: String,
        vlan_id: u16,
        kind: String,
        message: String,
    },
}

/// Receives audit events. Implementations must not block and must not fail the caller.
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, event: AuditEvent);
}

#[derive(Debug, Serialize)]
struct AuditRecord {
    at_ms: i64,
    #[serde(flatten)]
    event: AuditEvent,
}

/// Bounded channel in front of [`spawn_audit_writer`]. A full or closed channel drops the event.
#[derive(Debug, Clone)]
pub struct ChannelAudit {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAudit {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAudit {
    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!(error = %e, "audit event dropped");
        }
    }
}

/// Drains the channel until every sender is gone.
pub fn spawn_audit_writer(mut rx: mpsc::Receiver<AuditEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let record = AuditRecord {
                at_ms: chrono::Utc::now().timestamp_millis(),
                event,
            };
            match serde_json::to_string(&record) {
                Ok(line) => tracing::info!(target: AUDIT_TARGET, "{}", line),
                Err(e) => tracing::warn!(error = %e, "audit event serialization failed"),
            }
        }
        tracing::debug!("Audit writer shutting down");
    })
}
