// Fan-out tracing: one bounded task per device, group caller gate, batch deadline, ordered results

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};
use tracing::instrument;

use crate::audit::{AuditEvent, AuditSink};
use crate::classify::{self, PortFacts};
use crate::commands;
use crate::config::TraceConfig;
use crate::device_limits::DeviceLimiter;
use crate::error::{AdmissionRejection, SessionError};
use crate::load::LoadGuard;
use crate::models::{
    Credentials, Device, DeviceRef, MacAddress, PortMode, PortRecord, PortStatus, TraceBatch,
    TraceOutcome,
};
use crate::parsers::{MacLookup, parse_mac_table, parse_port_config, parse_status_table};
use crate::transport::{Connector, OutputSize, ReadTiming, Session, Shell};

/// Why a session could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenFailure {
    /// Admission control said no; nothing was sent over the network.
    Rejected(AdmissionRejection),
    Session(SessionError),
}

/// Everything needed to open one admitted session to one device.
pub struct DeviceAccess<C: Connector> {
    connector: Arc<C>,
    credentials: Credentials,
    limiter: Arc<DeviceLimiter>,
    timing: ReadTiming,
}

impl<C: Connector> DeviceAccess<C> {
    pub fn new(
        connector: Arc<C>,
        credentials: Credentials,
        limiter: Arc<DeviceLimiter>,
        timing: ReadTiming,
    ) -> Self {
        Self {
            connector,
            credentials,
            limiter,
            timing,
        }
    }

    pub fn limiter(&self) -> &Arc<DeviceLimiter> {
        &self.limiter
    }

    /// Acquires a device slot, then connects. The slot travels with the session.
    pub async fn open(&self, device: &Device) -> Result<Session<C::Shell>, OpenFailure> {
        let permit = self
            .limiter
            .acquire(&device.address)
            .map_err(OpenFailure::Rejected)?;
        Session::open(
            self.connector.as_ref(),
            device,
            &self.credentials,
            permit,
            self.timing,
        )
        .await
        .map_err(OpenFailure::Session)
    }
}

/// Counts active callers per device group.
#[derive(Debug)]
struct GroupGate {
    limit: usize,
    active: Mutex<HashMap<String, usize>>,
}

/// Released on drop, whichever way the batch ends.
struct GroupSlot<'a> {
    gate: &'a GroupGate,
    group: String,
}

impl GroupGate {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, group: &str) -> Option<GroupSlot<'_>> {
        let mut active = self.lock();
        let count = active.entry(group.to_string()).or_insert(0);
        if *count >= self.limit {
            return None;
        }
        *count += 1;
        Some(GroupSlot {
            gate: self,
            group: group.to_string(),
        })
    }

    fn active(&self, group: &str) -> usize {
        self.lock().get(group).copied().unwrap_or(0)
    }
}

impl Drop for GroupSlot<'_> {
    fn drop(&mut self) {
        let mut active = self.gate.lock();
        if let Some(count) = active.get_mut(&self.group) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                active.remove(&self.group);
            }
        }
    }
}

pub struct Tracer<C: Connector> {
    access: Arc<DeviceAccess<C>>,
    load: Arc<LoadGuard>,
    audit: Arc<dyn AuditSink>,
    config: TraceConfig,
    groups: GroupGate,
    uplink_exclusions: Arc<Vec<String>>,
}

impl<C: Connector> Tracer<C> {
    pub fn new(
        access: Arc<DeviceAccess<C>>,
        load: Arc<LoadGuard>,
        audit: Arc<dyn AuditSink>,
        config: TraceConfig,
    ) -> Self {
        Self {
            groups: GroupGate {
                limit: config.max_callers_per_group,
                active: Mutex::new(HashMap::new()),
            },
            uplink_exclusions: Arc::new(config.uplink_exclusions.clone()),
            access,
            load,
            audit,
            config,
        }
    }

    /// Callers currently tracing against `group`.
    pub fn active_callers(&self, group: &str) -> usize {
        self.groups.active(group)
    }

    /// Traces `mac` on every device of `group`. Either every device gets an outcome, or the
    /// whole batch resolves to a single rejection / timeout.
    #[instrument(skip(self, devices, mac), fields(mac = %mac, devices = devices.len()))]
    pub async fn trace_all(
        &self,
        group: &str,
        devices: Vec<Device>,
        mac: &MacAddress,
        caller: &str,
    ) -> TraceBatch {
        let started = Instant::now();
        let reject = |reason: String| {
            tracing::warn!(reason = %reason, "trace batch rejected");
            self.audit.record(AuditEvent::TraceRejected {
                caller: caller.to_string(),
                group: group.to_string(),
                mac: mac.canonical().to_string(),
                reason: reason.clone(),
            });
            TraceBatch::Rejected { reason }
        };

        let load_permit = match self.load.admit() {
            Ok(p) => p,
            Err(e) => return reject(e.to_string()),
        };
        let Some(_slot) = self.groups.enter(group) else {
            return reject(format!(
                "group {} already has {} active traces",
                group, self.groups.limit
            ));
        };

        self.audit.record(AuditEvent::TraceStarted {
            caller: caller.to_string(),
            group: group.to_string(),
            mac: mac.canonical().to_string(),
            devices: devices.len(),
        });

        let workers = self
            .config
            .max_workers
            .min(devices.len())
            .min(load_permit.max_workers())
            .max(1);
        tracing::info!(zone = ?load_permit.zone(), workers, "trace batch started");
        let pool = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, DeviceRef> = HashMap::with_capacity(devices.len());
        for device in devices {
            let access = Arc::clone(&self.access);
            let exclusions = Arc::clone(&self.uplink_exclusions);
            let pool = Arc::clone(&pool);
            let mac = mac.clone();
            let device_ref = device.to_ref();
            let handle = set.spawn(async move {
                let Ok(_worker) = pool.acquire_owned().await else {
                    // Pool closed: the batch already timed out, so never touch the device.
                    return TraceOutcome::UnexpectedError {
                        device: device.to_ref(),
                        error: "batch abandoned before dispatch".to_string(),
                    };
                };
                trace_device(&access, &device, &mac, &exclusions).await
            });
            pending.insert(handle.id(), device_ref);
        }

        let deadline = Duration::from_secs(self.config.batch_timeout_secs);
        let collected = tokio::time::timeout(deadline, collect(&mut set, &mut pending)).await;
        let mut outcomes = match collected {
            Ok(outcomes) => outcomes,
            Err(_) => {
                // In-flight tasks keep running and close their own sessions.
                pool.close();
                set.detach_all();
                tracing::warn!(timeout_secs = self.config.batch_timeout_secs, "trace batch timed out");
                self.audit.record(AuditEvent::TraceTimedOut {
                    caller: caller.to_string(),
                    group: group.to_string(),
                    mac: mac.canonical().to_string(),
                    timeout_secs: self.config.batch_timeout_secs,
                });
                return TraceBatch::TimedOut {
                    timeout_secs: self.config.batch_timeout_secs,
                };
            }
        };

        outcomes.sort_by(|a, b| {
            a.sort_rank()
                .cmp(&b.sort_rank())
                .then_with(|| a.device().name.cmp(&b.device().name))
        });
        let found = outcomes.iter().filter(|o| o.is_found()).count();
        let failed = outcomes.iter().filter(|o| o.sort_rank() == 3).count();
        tracing::info!(
            outcomes = outcomes.len(),
            found,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trace batch completed"
        );
        self.audit.record(AuditEvent::TraceCompleted {
            caller: caller.to_string(),
            group: group.to_string(),
            mac: mac.canonical().to_string(),
            found,
            failed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        TraceBatch::Completed { outcomes }
    }

    /// Single-device trace outside any batch; still subject to device admission control.
    pub async fn trace_one(&self, device: &Device, mac: &MacAddress) -> TraceOutcome {
        trace_device(&self.access, device, mac, &self.uplink_exclusions).await
    }
}

/// Gathers every task result. A panicked task becomes that device's `UnexpectedError`.
async fn collect(
    set: &mut JoinSet<TraceOutcome>,
    pending: &mut HashMap<tokio::task::Id, DeviceRef>,
) -> Vec<TraceOutcome> {
    let mut outcomes = Vec::with_capacity(pending.len());
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((id, outcome)) => {
                pending.remove(&id);
                outcomes.push(outcome);
            }
            Err(e) => {
                let Some(device) = pending.remove(&e.id()) else {
                    continue;
                };
                tracing::error!(device = %device.address, error = %e, "device task failed");
                outcomes.push(TraceOutcome::UnexpectedError {
                    device,
                    error: panic_message(e),
                });
            }
        }
    }
    outcomes
}

fn panic_message(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "device task panicked".to_string()
    }
}

fn outcome_for_error(device: DeviceRef, e: SessionError) -> TraceOutcome {
    let error = e.to_string();
    match e {
        SessionError::AuthenticationFailed(_) => TraceOutcome::AuthFailed { device, error },
        SessionError::NetworkUnreachable(_) | SessionError::Timeout(_) => {
            TraceOutcome::ConnectionFailed { device, error }
        }
        SessionError::ProtocolError(_) | SessionError::Closed => {
            TraceOutcome::ProtocolError { device, error }
        }
    }
}

/// One device: admit, open, look up, classify, always close.
#[instrument(skip_all, fields(device = %device.address, operation = "trace"))]
async fn trace_device<C: Connector>(
    access: &DeviceAccess<C>,
    device: &Device,
    mac: &MacAddress,
    uplink_exclusions: &[String],
) -> TraceOutcome {
    let mut session = match access.open(device).await {
        Ok(s) => s,
        Err(OpenFailure::Rejected(r)) => {
            tracing::info!(reason = %r, "session not admitted");
            return TraceOutcome::ConnectionRejected {
                device: device.to_ref(),
                reason: r.to_string(),
            };
        }
        Err(OpenFailure::Session(e)) => return outcome_for_error(device.to_ref(), e),
    };
    let result = lookup(&mut session, device, mac, uplink_exclusions).await;
    session.close().await;
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind(), "trace aborted");
            outcome_for_error(device.to_ref(), e)
        }
    }
}

async fn lookup<S: Shell>(
    session: &mut Session<S>,
    device: &Device,
    mac: &MacAddress,
    uplink_exclusions: &[String],
) -> Result<TraceOutcome, SessionError> {
    session
        .send(commands::DISABLE_PAGING, OutputSize::Small)
        .await?;
    let table = session
        .send(&commands::show_mac_address(mac), OutputSize::Small)
        .await?;
    let entry = match parse_mac_table(&table, mac, uplink_exclusions) {
        MacLookup::Found(entry) => entry,
        MacLookup::NotFound(reason) => {
            return Ok(TraceOutcome::NotFound {
                device: device.to_ref(),
                reason,
            });
        }
    };

    let config_raw = session
        .send(&commands::show_running_interface(&entry.port), OutputSize::Small)
        .await?;
    let config = parse_port_config(&config_raw);
    let status_raw = session
        .send(&commands::show_interface_status(&entry.port), OutputSize::Small)
        .await?;
    let status_row = parse_status_table(&status_raw)
        .into_iter()
        .find(|r| r.name.eq_ignore_ascii_case(&entry.port));

    let description = if config.description.is_empty() {
        status_row
            .as_ref()
            .map(|r| r.description.clone())
            .unwrap_or_default()
    } else {
        config.description.clone()
    };
    let mode = match (config.mode, &status_row) {
        (PortMode::Unknown, Some(row)) => row.mode,
        (mode, _) => mode,
    };
    let record = PortRecord {
        name: entry.port.clone(),
        // No status row means the state is unknown; never report a port as up on a guess.
        status: status_row.as_ref().map_or(PortStatus::Down, |r| r.status),
        mode,
        vlan: config.vlan.or(Some(entry.vlan)),
        tagged_vlans: config.tagged_vlans.clone(),
        description,
    };

    let mut vlans = record.tagged_vlans.clone();
    vlans.extend(record.vlan);
    let facts = PortFacts {
        port: &entry.port,
        model: &device.model,
        description: &record.description,
        mode: record.mode,
        vlans: &vlans,
    };
    Ok(TraceOutcome::Found {
        device: device.to_ref(),
        port_type: classify::port_type(&entry.port, &device.model, &record.description),
        cautions: classify::cautions(&facts),
        port: entry.port,
        vlan: entry.vlan,
        entry_type: entry.entry_type,
        port_record: record,
    })
}
