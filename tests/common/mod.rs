// Shared test helpers: scripted in-memory connector, recording audit sink, canned device output

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mactrace::audit::{AuditEvent, AuditSink};
use mactrace::config::{DeviceLimitsConfig, LoadConfig, TraceConfig};
use mactrace::device_limits::DeviceLimiter;
use mactrace::error::SessionError;
use mactrace::load::LoadGuard;
use mactrace::models::{Credentials, Device};
use mactrace::orchestrator::{DeviceAccess, Tracer};
use mactrace::transport::{Connector, ReadTiming, Shell};
use mactrace::vlan::VlanWorkflow;

pub const MAC_TABLE_GI5: &str = "
Aging time is 300 Sec

Vlan     Mac Address           Type        Port
-------- --------------------- ----------- ---------------------
100      AABB.CCDD.EEFF        Dynamic     Gi1/0/5

Total MAC Addresses in use: 1
";

pub const MAC_TABLE_EMPTY: &str = "
Aging time is 300 Sec

Vlan     Mac Address           Type        Port
-------- --------------------- ----------- ---------------------

Total MAC Addresses in use: 0
";

pub const RUNNING_GI5: &str = "
interface Gi1/0/5
description \"Desk 12\"
switchport access vlan 100
exit
";

pub const STATUS_GI5: &str = "
Port       Description                    Vlan  Duplex Speed   Neg  Link   Flow Ctrl
                                                                    State  Status
---------  -----------------------------  ----- ------ ------- ---- ------ ---------
Gi1/0/5    Desk 12                        100   Full   1000    Auto Up     Inactive
";

/// How a scripted device answers the connect call.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    Accept,
    Fail(SessionError),
    /// Accepts after this long (drives batch deadlines under paused time).
    Delay(Duration),
    Panic,
}

#[derive(Debug, Clone)]
pub struct DeviceScript {
    pub connect: ConnectBehavior,
    pub banner: String,
    /// Command -> successive replies. The last reply repeats once the queue runs dry.
    pub replies: HashMap<String, VecDeque<String>>,
    /// Terminal echo: every reply starts with `console#<command>`, as a PTY prints it.
    pub echo: bool,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            connect: ConnectBehavior::Accept,
            banner: "\r\nconsole>".to_string(),
            replies: HashMap::new(),
            echo: false,
        }
    }
}

impl DeviceScript {
    pub fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push_back(output.to_string());
        self
    }

    pub fn connect(mut self, behavior: ConnectBehavior) -> Self {
        self.connect = behavior;
        self
    }

    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }
}

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, DeviceScript>>,
    connects: AtomicUsize,
    commands: Mutex<Vec<(String, String)>>,
    echo_all: AtomicBool,
}

/// In-memory `Connector`: counts connects and records every command line per device.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    inner: Arc<Inner>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every device, scripted or not, echoes the commands it receives.
    pub fn echoing() -> Self {
        let connector = Self::default();
        connector.inner.echo_all.store(true, Ordering::SeqCst);
        connector
    }

    pub fn script(&self, address: &str, script: DeviceScript) {
        self.inner
            .scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), script);
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Commands sent to one device, in order.
    pub fn commands(&self, address: &str) -> Vec<String> {
        self.inner
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == address)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

impl Connector for ScriptedConnector {
    type Shell = ScriptedShell;

    async fn connect(&self, device: &Device, _credentials: &Credentials) -> Result<ScriptedShell, SessionError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        let script = self
            .inner
            .scripts
            .lock()
            .unwrap()
            .get(&device.address)
            .cloned()
            .unwrap_or_default();
        match &script.connect {
            ConnectBehavior::Accept => {}
            ConnectBehavior::Fail(e) => return Err(e.clone()),
            ConnectBehavior::Delay(d) => tokio::time::sleep(*d).await,
            ConnectBehavior::Panic => panic!("scripted connect panic for {}", device.address),
        }
        let mut pending = VecDeque::new();
        if !script.banner.is_empty() {
            pending.push_back(script.banner.clone().into_bytes());
        }
        Ok(ScriptedShell {
            address: device.address.clone(),
            inner: Arc::clone(&self.inner),
            replies: script.replies,
            pending,
            echo: script.echo || self.inner.echo_all.load(Ordering::SeqCst),
        })
    }
}

pub struct ScriptedShell {
    address: String,
    inner: Arc<Inner>,
    replies: HashMap<String, VecDeque<String>>,
    pending: VecDeque<Vec<u8>>,
    echo: bool,
}

impl ScriptedShell {
    fn answer(&mut self, command: &str) -> Option<String> {
        let queue = self.replies.get_mut(command)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Shell for ScriptedShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let text = String::from_utf8_lossy(data);
        let Some(line) = text.strip_suffix('\n') else {
            return Ok(());
        };
        let command = line.trim().to_string();
        self.inner
            .commands
            .lock()
            .unwrap()
            .push((self.address.clone(), command.clone()));
        let mut reply = if self.echo {
            format!("console#{}\r\n", command)
        } else {
            String::new()
        };
        if let Some(out) = self.answer(&command) {
            reply.push_str(&out);
        }
        if !reply.is_empty() {
            self.pending.push_back(reply.into_bytes());
        }
        Ok(())
    }

    async fn read_chunk(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        tokio::time::sleep(wait).await;
        Ok(None)
    }

    async fn disconnect(&mut self) {}
}

#[derive(Default)]
pub struct RecordingAudit {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "admin".into(),
        password: "secret".into(),
    }
}

pub fn timing() -> ReadTiming {
    ReadTiming {
        idle: Duration::from_millis(50),
        bulk_idle: Duration::from_millis(200),
        max_wait: Duration::from_secs(2),
        bulk_max_wait: Duration::from_secs(5),
        banner_drain: Duration::from_millis(100),
    }
}

pub fn limiter() -> Arc<DeviceLimiter> {
    DeviceLimiter::new(DeviceLimitsConfig::default())
}

pub fn access(connector: &ScriptedConnector, limiter: Arc<DeviceLimiter>) -> Arc<DeviceAccess<ScriptedConnector>> {
    Arc::new(DeviceAccess::new(
        Arc::new(connector.clone()),
        credentials(),
        limiter,
        timing(),
    ))
}

pub fn tracer(
    connector: &ScriptedConnector,
    limiter: Arc<DeviceLimiter>,
    config: TraceConfig,
) -> (Tracer<ScriptedConnector>, Arc<RecordingAudit>) {
    let audit = Arc::new(RecordingAudit::default());
    let tracer = Tracer::new(
        access(connector, limiter),
        LoadGuard::new(LoadConfig::default()),
        audit.clone(),
        config,
    );
    (tracer, audit)
}

pub fn workflow(connector: &ScriptedConnector) -> (VlanWorkflow<ScriptedConnector>, Arc<RecordingAudit>) {
    let audit = Arc::new(RecordingAudit::default());
    (VlanWorkflow::new(access(connector, limiter()), audit.clone()), audit)
}

pub fn device(n: usize) -> Device {
    Device::new(format!("10.0.0.{}", n), format!("sw-{:02}", n), "N2048P")
}

/// The same scenario against a quiet terminal and an echoing one.
pub fn connectors() -> [ScriptedConnector; 2] {
    [ScriptedConnector::new(), ScriptedConnector::echoing()]
}
