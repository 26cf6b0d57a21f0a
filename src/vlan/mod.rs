// VLAN change workflow:
// validate -> uplink safety -> VLAN existence -> port states -> confirm -> ranges -> execute -> verify.
// Nothing is written to the device before the confirmation gate has passed.

mod ranges;
mod validate;

pub use ranges::{InterfaceRange, compact};
pub use validate::{MAX_PORTS, ValidatedRequest, expand_port_spec, validate_request, validate_vlan_id};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::instrument;

use crate::audit::{AuditEvent, AuditSink};
use crate::classify;
use crate::commands;
use crate::error::{AdmissionRejection, SessionError};
use crate::models::{
    Device, PortFailure, PortMode, PortRecord, VlanAction, VlanChangeReport, VlanChangeRequest,
    VlanChangeResult,
};
use crate::orchestrator::{DeviceAccess, OpenFailure};
use crate::parsers::{
    InterfaceName, device_error, parse_port_config, parse_status_table, parse_vlan_show,
};
use crate::transport::{Connector, OutputSize, Session, Shell};

/// Target ports split by the uplink safety check.
#[derive(Debug, Default)]
struct TargetSet {
    ports: Vec<InterfaceName>,
    excluded_uplinks: Vec<String>,
    /// Uplinks kept because of the override flag. Always routed through confirmation.
    overridden_uplinks: Vec<String>,
}

fn check_uplink_safety(ports: Vec<InterfaceName>, model: &str, override_uplink: bool) -> TargetSet {
    let mut set = TargetSet::default();
    for port in ports {
        let name = port.to_string();
        if !(port.is_port_channel() || classify::is_uplink_name(&name, model)) {
            set.ports.push(port);
        } else if override_uplink {
            set.overridden_uplinks.push(name);
            set.ports.push(port);
        } else {
            set.excluded_uplinks.push(name);
        }
    }
    set
}

fn is_at_target(record: &PortRecord, vlan_id: u16) -> bool {
    record.vlan == Some(vlan_id) && record.mode == PortMode::Access
}

/// Observed state of every target, sorted into buckets.
#[derive(Debug, Default)]
struct PortAssessment {
    already_set: Vec<InterfaceName>,
    safe: Vec<InterfaceName>,
    blocking: Vec<InterfaceName>,
    missing: Vec<InterfaceName>,
}

fn assess_ports(
    targets: &TargetSet,
    table: &HashMap<String, PortRecord>,
    vlan_id: u16,
) -> PortAssessment {
    let mut out = PortAssessment::default();
    for port in &targets.ports {
        let name = port.to_string();
        let Some(record) = table.get(&name.to_ascii_lowercase()) else {
            out.missing.push(port.clone());
            continue;
        };
        if is_at_target(record, vlan_id) {
            out.already_set.push(port.clone());
        } else if targets.overridden_uplinks.contains(&name)
            || (record.status.is_up() && record.mode != PortMode::Access)
        {
            out.blocking.push(port.clone());
        } else {
            out.safe.push(port.clone());
        }
    }
    out
}

fn names(ports: &[InterfaceName]) -> Vec<String> {
    ports.iter().map(|p| p.to_string()).collect()
}

fn status_map(raw: &str) -> HashMap<String, PortRecord> {
    parse_status_table(raw)
        .into_iter()
        .map(|r| (r.name.to_ascii_lowercase(), r))
        .collect()
}

fn failed(kind: &str, message: impl Into<String>) -> VlanChangeResult {
    VlanChangeResult::Failed {
        kind: kind.to_string(),
        message: message.into(),
    }
}

fn rejection_kind(r: &AdmissionRejection) -> &'static str {
    match r {
        AdmissionRejection::DeviceOverloaded { .. } => "device_overloaded",
        _ => "connection_rejected",
    }
}

pub struct VlanWorkflow<C: Connector> {
    access: Arc<DeviceAccess<C>>,
    audit: Arc<dyn AuditSink>,
}

impl<C: Connector> VlanWorkflow<C> {
    pub fn new(access: Arc<DeviceAccess<C>>, audit: Arc<dyn AuditSink>) -> Self {
        Self { access, audit }
    }

    /// Runs the whole workflow against one device. Always resolves to a terminal state.
    #[instrument(skip(self, device, request), fields(device = %device.address, vlan = request.vlan_id))]
    pub async fn apply(
        &self,
        device: &Device,
        request: &VlanChangeRequest,
        caller: &str,
    ) -> VlanChangeResult {
        let result = self.run(device, request).await;
        match &result {
            VlanChangeResult::Completed(report) => {
                tracing::info!(
                    changed = report.ports_changed.len(),
                    already_set = report.ports_already_set.len(),
                    failed = report.ports_failed.len(),
                    "VLAN change completed"
                );
                self.audit.record(AuditEvent::VlanChangeApplied {
                    caller: caller.to_string(),
                    device: device.address.clone(),
                    vlan_id: report.vlan_id,
                    ports_changed: report.ports_changed.clone(),
                    ports_failed: report.ports_failed.iter().map(|f| f.port.clone()).collect(),
                });
            }
            VlanChangeResult::ConfirmationNeeded { blocking, .. } => {
                tracing::info!(blocking = ?blocking, "VLAN change needs confirmation");
            }
            VlanChangeResult::Failed { kind, message } => {
                tracing::warn!(kind = %kind, error = %message, "VLAN change failed");
                self.audit.record(AuditEvent::VlanChangeFailed {
                    caller: caller.to_string(),
                    device: device.address.clone(),
                    vlan_id: request.vlan_id,
                    kind: kind.clone(),
                    message: message.clone(),
                });
            }
        }
        result
    }

    async fn run(&self, device: &Device, request: &VlanChangeRequest) -> VlanChangeResult {
        let validated = match validate_request(request) {
            Ok(v) => v,
            Err(e) => return failed("validation_error", e.to_string()),
        };
        let targets = check_uplink_safety(validated.ports.clone(), &device.model, request.override_uplink);
        if targets.ports.is_empty() {
            return failed(
                "validation_error",
                format!(
                    "no target ports left after excluding uplinks: {}",
                    targets.excluded_uplinks.join(", ")
                ),
            );
        }

        let mut session = match self.access.open(device).await {
            Ok(s) => s,
            Err(OpenFailure::Rejected(r)) => return failed(rejection_kind(&r), r.to_string()),
            Err(OpenFailure::Session(e)) => return failed(e.kind(), e.to_string()),
        };
        let result = drive(&mut session, &validated, &targets, request).await;
        session.close().await;
        result.unwrap_or_else(|e| failed(e.kind(), e.to_string()))
    }
}

/// Everything after the session is open. Session errors abort; the caller still closes.
async fn drive<S: Shell>(
    session: &mut Session<S>,
    validated: &ValidatedRequest,
    targets: &TargetSet,
    request: &VlanChangeRequest,
) -> Result<VlanChangeResult, SessionError> {
    let vlan_id = validated.vlan_id;
    session
        .send(commands::DISABLE_PAGING, OutputSize::Small)
        .await?;

    let vlan_raw = session
        .send(&commands::show_vlan(vlan_id), OutputSize::Small)
        .await?;
    let existing = parse_vlan_show(&vlan_raw, vlan_id);
    let vlan_action = match (&existing.name, &validated.vlan_name) {
        _ if !existing.exists => VlanAction::Created,
        (Some(current), Some(wanted)) if current != wanted => VlanAction::Renamed,
        (None, Some(_)) => VlanAction::Renamed,
        _ => VlanAction::Existing,
    };

    let before = status_map(
        &session
            .send(commands::SHOW_INTERFACES_STATUS, OutputSize::Bulk)
            .await?,
    );
    let mut assessment = assess_ports(targets, &before, vlan_id);

    let mut skipped = Vec::new();
    if !assessment.blocking.is_empty() {
        if request.skip_unsafe {
            skipped = std::mem::take(&mut assessment.blocking);
        } else if request.force {
            let blocking = std::mem::take(&mut assessment.blocking);
            assessment.safe.extend(blocking);
        } else {
            return Ok(VlanChangeResult::ConfirmationNeeded {
                blocking: names(&assessment.blocking),
                safe: names(&assessment.safe),
            });
        }
    }

    let mut report = VlanChangeReport {
        vlan_id,
        vlan_action,
        ports_changed: Vec::new(),
        ports_already_set: names(&assessment.already_set),
        ports_skipped_unsafe: names(&skipped),
        ports_excluded_uplink: targets.excluded_uplinks.clone(),
        ports_failed: assessment
            .missing
            .iter()
            .map(|p| PortFailure {
                port: p.to_string(),
                reason: "port not found on device".to_string(),
            })
            .collect(),
        ranges_applied: Vec::new(),
    };

    if vlan_action != VlanAction::Existing {
        if let Some(refusal) = ensure_vlan(session, vlan_id, validated.vlan_name.as_deref()).await? {
            return Ok(failed(
                "command_rejected",
                format!("device refused VLAN {}: {}", vlan_id, refusal),
            ));
        }
    }

    if assessment.safe.is_empty() {
        return Ok(VlanChangeResult::Completed(report));
    }

    let mut rejected: HashMap<String, String> = HashMap::new();
    session.send(commands::CONFIGURE, OutputSize::Small).await?;
    for range in compact(&assessment.safe) {
        let expression = range.to_string();
        let Some(refusal) =
            configure_interface(session, &expression, !range.is_single(), validated).await?
        else {
            report.ranges_applied.push(expression);
            continue;
        };
        if range.is_single() {
            rejected.insert(expression, refusal);
            continue;
        }
        tracing::warn!(range = %expression, "range command rejected, falling back to single ports");
        for port in range.ports() {
            let name = port.to_string();
            match configure_interface(session, &name, false, validated).await? {
                Some(refusal) => {
                    rejected.insert(name, refusal);
                }
                None => report.ranges_applied.push(name),
            }
        }
    }
    session.send(commands::END, OutputSize::Small).await?;

    let after = status_map(
        &session
            .send(commands::SHOW_INTERFACES_STATUS, OutputSize::Bulk)
            .await?,
    );
    // Observed state decides; a refusal only explains a port that did not move.
    for port in &assessment.safe {
        let name = port.to_string();
        let refusal = rejected.remove(&name);
        let observed = after.get(&name.to_ascii_lowercase());
        if observed.is_some_and(|r| is_at_target(r, vlan_id)) {
            if let Some(reason) = refusal {
                tracing::debug!(port = %name, reason = %reason, "port reached target despite a refused command");
            }
            report.ports_changed.push(name);
            continue;
        }
        if let Some(reason) = refusal {
            report.ports_failed.push(PortFailure {
                port: name,
                reason: format!("command rejected: {}", reason),
            });
            continue;
        }
        match retry_and_verify(session, &name, validated).await? {
            None => report.ports_changed.push(name),
            Some(reason) => report.ports_failed.push(PortFailure { port: name, reason }),
        }
    }
    Ok(VlanChangeResult::Completed(report))
}

/// Sends one configuration line. Returns the device's refusal, if it printed one.
async fn send_checked<S: Shell>(
    session: &mut Session<S>,
    line: &str,
) -> Result<Option<String>, SessionError> {
    let output = session.send(line, OutputSize::Small).await?;
    Ok(device_error(&output, line).map(str::to_string))
}

/// Creates or renames the VLAN. Returns the first refusal.
async fn ensure_vlan<S: Shell>(
    session: &mut Session<S>,
    vlan_id: u16,
    name: Option<&str>,
) -> Result<Option<String>, SessionError> {
    let mut lines = vec![commands::CONFIGURE.to_string(), commands::vlan(vlan_id)];
    lines.extend(name.map(commands::vlan_name));
    lines.push(commands::EXIT.to_string());
    lines.push(commands::END.to_string());
    let mut refusal = None;
    for line in &lines {
        let outcome = send_checked(session, line).await?;
        refusal = refusal.or(outcome);
    }
    Ok(refusal)
}

/// Applies access mode + VLAN (+ description) to one interface or range. Expects config mode.
/// Returns the first refusal.
async fn configure_interface<S: Shell>(
    session: &mut Session<S>,
    target: &str,
    is_range: bool,
    validated: &ValidatedRequest,
) -> Result<Option<String>, SessionError> {
    let enter = if is_range {
        commands::interface_range(target)
    } else {
        commands::interface(target)
    };
    let mut lines = vec![
        enter,
        commands::SWITCHPORT_MODE_ACCESS.to_string(),
        commands::switchport_access_vlan(validated.vlan_id),
    ];
    lines.extend(validated.description.as_deref().map(commands::description));
    let mut refusal = None;
    for line in &lines {
        let outcome = send_checked(session, line).await?;
        refusal = refusal.or(outcome);
    }
    // Leaves interface mode even when the device rejected part of the block.
    session.send(commands::EXIT, OutputSize::Small).await?;
    Ok(refusal)
}

/// One more single-port attempt, then a running-config read. `None` means verified.
async fn retry_and_verify<S: Shell>(
    session: &mut Session<S>,
    port: &str,
    validated: &ValidatedRequest,
) -> Result<Option<String>, SessionError> {
    tracing::info!(port, "verification mismatch, retrying single port");
    session.send(commands::CONFIGURE, OutputSize::Small).await?;
    configure_interface(session, port, false, validated).await?;
    session.send(commands::END, OutputSize::Small).await?;

    let raw = session
        .send(&commands::show_running_interface(port), OutputSize::Small)
        .await?;
    let config = parse_port_config(&raw);
    if config.vlan == Some(validated.vlan_id) && config.mode == PortMode::Access {
        return Ok(None);
    }
    Ok(Some(format!(
        "verification mismatch: expected access VLAN {}, observed {} in {:?} mode",
        validated.vlan_id,
        config
            .vlan
            .map_or_else(|| "no VLAN".to_string(), |v| format!("VLAN {}", v)),
        config.mode
    )))
}
