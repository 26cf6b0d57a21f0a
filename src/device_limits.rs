// Per-device admission control: session ceilings, command rate, failure backoff, health tiers.
// One short-held mutex guards all counters; no I/O ever happens under it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::time::{Duration, Instant, interval};

use crate::config::DeviceLimitsConfig;
use crate::error::AdmissionRejection;

/// Rolling window used for the commands-per-second figure.
const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Healthy,
    Degraded,
    Overloaded,
}

#[derive(Debug)]
struct DeviceHealth {
    active_sessions: usize,
    recent_commands: VecDeque<Instant>,
    consecutive_failures: u32,
    backoff: Duration,
    backoff_until: Option<Instant>,
    last_failure: Option<Instant>,
    tier: HealthTier,
}

impl DeviceHealth {
    fn new() -> Self {
        Self {
            active_sessions: 0,
            recent_commands: VecDeque::new(),
            consecutive_failures: 0,
            backoff: Duration::ZERO,
            backoff_until: None,
            last_failure: None,
            tier: HealthTier::Healthy,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.recent_commands.front() {
            if now.duration_since(*front) > RATE_WINDOW {
                self.recent_commands.pop_front();
            } else {
                break;
            }
        }
    }

    fn remaining_backoff(&self, now: Instant) -> Duration {
        self.backoff_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    devices: HashMap<String, DeviceHealth>,
    global_active: usize,
}

/// Read-only view for the health endpoint and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHealthSnapshot {
    pub device: String,
    pub tier: HealthTier,
    pub active_sessions: usize,
    pub commands_last_second: usize,
    pub consecutive_failures: u32,
    pub backoff_remaining_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTransition {
    pub device: String,
    pub from: HealthTier,
    pub to: HealthTier,
}

/// Explicitly constructed and shared via `Arc`; tests build isolated instances.
#[derive(Debug)]
pub struct DeviceLimiter {
    config: DeviceLimitsConfig,
    state: Mutex<LimiterState>,
}

/// Held for the lifetime of one session. Dropping it releases the slot.
#[derive(Debug)]
pub struct DevicePermit {
    limiter: Arc<DeviceLimiter>,
    device: String,
}

impl DevicePermit {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn limiter(&self) -> &Arc<DeviceLimiter> {
        &self.limiter
    }
}

impl Drop for DevicePermit {
    fn drop(&mut self) {
        self.limiter.release(&self.device);
    }
}

impl DeviceLimiter {
    pub fn new(config: DeviceLimitsConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(LimiterState::default()),
        })
    }

    pub fn config(&self) -> &DeviceLimitsConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Grants a session slot or says why not. Never touches the network.
    pub fn acquire(self: &Arc<Self>, device: &str) -> Result<DevicePermit, AdmissionRejection> {
        let now = Instant::now();
        let mut state = self.lock();
        if state.global_active >= self.config.max_global_sessions {
            return Err(AdmissionRejection::GlobalSessionLimit {
                limit: self.config.max_global_sessions,
            });
        }
        let health = state
            .devices
            .entry(device.to_string())
            .or_insert_with(DeviceHealth::new);
        health.prune(now);

        if health.active_sessions >= self.config.max_sessions_per_device {
            return Err(AdmissionRejection::DeviceSessionLimit {
                device: device.to_string(),
                active: health.active_sessions,
                limit: self.config.max_sessions_per_device,
            });
        }
        let remaining = health.remaining_backoff(now);
        if health.tier == HealthTier::Overloaded && !remaining.is_zero() {
            return Err(AdmissionRejection::DeviceOverloaded {
                device: device.to_string(),
                remaining_ms: remaining.as_millis() as u64,
            });
        }
        if health.recent_commands.len() > self.config.max_commands_per_sec {
            return Err(AdmissionRejection::CommandRate {
                device: device.to_string(),
                rate: health.recent_commands.len(),
                limit: self.config.max_commands_per_sec,
            });
        }

        health.active_sessions += 1;
        state.global_active += 1;
        Ok(DevicePermit {
            limiter: Arc::clone(self),
            device: device.to_string(),
        })
    }

    /// Counters saturate at zero.
    pub fn release(&self, device: &str) {
        let mut state = self.lock();
        state.global_active = state.global_active.saturating_sub(1);
        if let Some(health) = state.devices.get_mut(device) {
            health.active_sessions = health.active_sessions.saturating_sub(1);
        }
    }

    /// Called after every command send, success or not.
    pub fn record_command(&self, device: &str, success: bool) {
        let now = Instant::now();
        let mut state = self.lock();
        let health = state
            .devices
            .entry(device.to_string())
            .or_insert_with(DeviceHealth::new);
        health.recent_commands.push_back(now);
        health.prune(now);
        if success {
            health.consecutive_failures = 0;
            return;
        }
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure = Some(now);
        let base = Duration::from_millis(self.config.base_backoff_ms);
        let cap = Duration::from_secs(self.config.max_backoff_secs);
        health.backoff = if health.backoff.is_zero() {
            base
        } else {
            health.backoff.saturating_mul(2)
        }
        .min(cap);
        health.backoff_until = Some(now + health.backoff);
    }

    /// Recomputes every device's tier. Returns the transitions so the caller can log them.
    pub fn evaluate(&self) -> Vec<TierTransition> {
        let now = Instant::now();
        let recovery = Duration::from_secs(self.config.recovery_secs);
        let mut transitions = Vec::new();
        let mut state = self.lock();
        for (device, health) in state.devices.iter_mut() {
            health.prune(now);
            let quiet = health
                .last_failure
                .is_none_or(|t| now.duration_since(t) >= recovery);
            if quiet && health.consecutive_failures > 0 {
                health.consecutive_failures = 0;
            }
            if quiet {
                health.backoff = Duration::ZERO;
                health.backoff_until = None;
            }

            let rate = health.recent_commands.len();
            let max_rate = self.config.max_commands_per_sec;
            let tier = if health.consecutive_failures >= self.config.overloaded_failures
                || rate > max_rate
            {
                HealthTier::Overloaded
            } else if health.consecutive_failures >= self.config.degraded_failures
                || rate * 10 >= max_rate * 7
            {
                HealthTier::Degraded
            } else {
                HealthTier::Healthy
            };
            if tier != health.tier {
                transitions.push(TierTransition {
                    device: device.clone(),
                    from: health.tier,
                    to: tier,
                });
                health.tier = tier;
            }
        }
        transitions
    }

    pub fn snapshot(&self) -> Vec<DeviceHealthSnapshot> {
        let now = Instant::now();
        let state = self.lock();
        let mut out: Vec<DeviceHealthSnapshot> = state
            .devices
            .iter()
            .map(|(device, h)| DeviceHealthSnapshot {
                device: device.clone(),
                tier: h.tier,
                active_sessions: h.active_sessions,
                commands_last_second: h
                    .recent_commands
                    .iter()
                    .filter(|t| now.duration_since(**t) <= RATE_WINDOW)
                    .count(),
                consecutive_failures: h.consecutive_failures,
                backoff_remaining_ms: h.remaining_backoff(now).as_millis() as u64,
            })
            .collect();
        out.sort_by(|a, b| a.device.cmp(&b.device));
        out
    }

    pub fn global_active(&self) -> usize {
        self.lock().global_active
    }
}

/// Periodic tier evaluation; logs transitions. Exits on shutdown.
pub fn spawn_evaluator(
    limiter: Arc<DeviceLimiter>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let every = Duration::from_secs(limiter.config.evaluate_interval_secs);
    tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    for t in limiter.evaluate() {
                        if t.to == HealthTier::Healthy {
                            tracing::info!(device = %t.device, from = ?t.from, to = ?t.to, "device health recovered");
                        } else {
                            tracing::warn!(device = %t.device, from = ?t.from, to = ?t.to, "device health tier changed");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::debug!("Device health evaluator shutting down");
                    break;
                }
            }
        }
    })
}
