use serde::{Deserialize, Serialize};

use crate::models::{Credentials, Device};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub credentials: Credentials,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub device_limits: DeviceLimitsConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub port: u16,
    pub connect_timeout_secs: u64,
    /// Quiet period that ends a short command response.
    pub idle_timeout_ms: u64,
    /// Quiet period that ends a bulk / tabular response.
    pub bulk_idle_timeout_ms: u64,
    /// Absolute cap per command regardless of idle state.
    pub max_wait_ms: u64,
    pub bulk_max_wait_ms: u64,
    /// How long to drain the login banner before the first command.
    pub banner_drain_ms: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout_secs: 10,
            idle_timeout_ms: 800,
            bulk_idle_timeout_ms: 2_500,
            max_wait_ms: 10_000,
            bulk_max_wait_ms: 45_000,
            banner_drain_ms: 1_500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Ceiling for the per-batch worker pool.
    pub max_workers: usize,
    /// Wall-clock deadline for a whole batch.
    pub batch_timeout_secs: u64,
    /// Concurrent callers allowed to trace the same group.
    pub max_callers_per_group: usize,
    /// Address-table hits on these ports are not reported. Alphabetic entries are prefixes.
    pub uplink_exclusions: Vec<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_workers: 16,
            batch_timeout_secs: 120,
            max_callers_per_group: 3,
            uplink_exclusions: vec!["Po".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceLimitsConfig {
    pub max_sessions_per_device: usize,
    pub max_global_sessions: usize,
    /// New sessions are refused once the last second saw more commands than this.
    pub max_commands_per_sec: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_secs: u64,
    /// Consecutive failures before a device is degraded.
    pub degraded_failures: u32,
    /// Consecutive failures before a device is overloaded (backoff enforced).
    pub overloaded_failures: u32,
    /// Failure-free period after which a device returns to healthy.
    pub recovery_secs: u64,
    pub evaluate_interval_secs: u64,
}

impl Default for DeviceLimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_device: 3,
            max_global_sessions: 64,
            max_commands_per_sec: 10,
            base_backoff_ms: 1_000,
            max_backoff_secs: 60,
            degraded_failures: 2,
            overloaded_failures: 4,
            recovery_secs: 60,
            evaluate_interval_secs: 5,
        }
    }
}

/// Caller / worker ceilings for one protection zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneLimits {
    pub max_callers: usize,
    pub max_workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub sample_interval_ms: u64,
    /// Samples in the short window (drives zone selection).
    pub short_window: usize,
    pub long_window: usize,
    pub yellow_percent: f64,
    pub red_percent: f64,
    pub critical_percent: f64,
    pub green: ZoneLimits,
    pub yellow: ZoneLimits,
    /// `max_callers` here is also the capacity of the red-zone admission queue.
    pub red: ZoneLimits,
    pub critical: ZoneLimits,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2_000,
            short_window: 5,
            long_window: 30,
            yellow_percent: 70.0,
            red_percent: 85.0,
            critical_percent: 95.0,
            green: ZoneLimits {
                max_callers: 32,
                max_workers: 16,
            },
            yellow: ZoneLimits {
                max_callers: 16,
                max_workers: 8,
            },
            red: ZoneLimits {
                max_callers: 4,
                max_workers: 4,
            },
            critical: ZoneLimits {
                max_callers: 0,
                max_workers: 0,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path, e))?;
        let mut config = Self::load_from_str(&s)?;
        config.apply_env_credentials();
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// `SWITCH_USERNAME` / `SWITCH_PASSWORD` take precedence over the file.
    fn apply_env_credentials(&mut self) {
        if let Ok(user) = std::env::var("SWITCH_USERNAME")
            && !user.is_empty()
        {
            self.credentials.username = user;
        }
        if let Ok(pass) = std::env::var("SWITCH_PASSWORD")
            && !pass.is_empty()
        {
            self.credentials.password = pass;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.credentials.username.is_empty(),
            "credentials.username must be non-empty"
        );
        anyhow::ensure!(self.ssh.port > 0, "ssh.port must be > 0");
        anyhow::ensure!(
            self.ssh.idle_timeout_ms > 0 && self.ssh.bulk_idle_timeout_ms > 0,
            "ssh.idle_timeout_ms and ssh.bulk_idle_timeout_ms must be > 0"
        );
        anyhow::ensure!(
            self.ssh.max_wait_ms >= self.ssh.idle_timeout_ms,
            "ssh.max_wait_ms must be >= ssh.idle_timeout_ms, got {}",
            self.ssh.max_wait_ms
        );
        anyhow::ensure!(
            self.ssh.bulk_max_wait_ms >= self.ssh.bulk_idle_timeout_ms,
            "ssh.bulk_max_wait_ms must be >= ssh.bulk_idle_timeout_ms, got {}",
            self.ssh.bulk_max_wait_ms
        );
        anyhow::ensure!(
            self.trace.max_workers > 0,
            "trace.max_workers must be > 0, got {}",
            self.trace.max_workers
        );
        anyhow::ensure!(
            self.trace.batch_timeout_secs > 0,
            "trace.batch_timeout_secs must be > 0, got {}",
            self.trace.batch_timeout_secs
        );
        anyhow::ensure!(
            self.trace.max_callers_per_group > 0,
            "trace.max_callers_per_group must be > 0, got {}",
            self.trace.max_callers_per_group
        );
        anyhow::ensure!(
            self.device_limits.max_sessions_per_device > 0,
            "device_limits.max_sessions_per_device must be > 0, got {}",
            self.device_limits.max_sessions_per_device
        );
        anyhow::ensure!(
            self.device_limits.max_global_sessions >= self.device_limits.max_sessions_per_device,
            "device_limits.max_global_sessions must be >= max_sessions_per_device, got {}",
            self.device_limits.max_global_sessions
        );
        anyhow::ensure!(
            self.device_limits.max_commands_per_sec > 0,
            "device_limits.max_commands_per_sec must be > 0, got {}",
            self.device_limits.max_commands_per_sec
        );
        anyhow::ensure!(
            self.device_limits.degraded_failures <= self.device_limits.overloaded_failures,
            "device_limits.degraded_failures must be <= overloaded_failures"
        );
        anyhow::ensure!(
            self.device_limits.evaluate_interval_secs > 0,
            "device_limits.evaluate_interval_secs must be > 0, got {}",
            self.device_limits.evaluate_interval_secs
        );
        anyhow::ensure!(
            self.load.sample_interval_ms > 0,
            "load.sample_interval_ms must be > 0, got {}",
            self.load.sample_interval_ms
        );
        anyhow::ensure!(
            self.load.short_window > 0 && self.load.long_window >= self.load.short_window,
            "load.short_window must be > 0 and <= load.long_window"
        );
        anyhow::ensure!(
            self.load.yellow_percent < self.load.red_percent
                && self.load.red_percent < self.load.critical_percent,
            "load thresholds must increase: yellow < red < critical"
        );
        anyhow::ensure!(
            self.load.green.max_workers >= self.load.yellow.max_workers
                && self.load.yellow.max_workers >= self.load.red.max_workers
                && self.load.red.max_workers >= self.load.critical.max_workers,
            "load zone max_workers must not increase with severity"
        );
        anyhow::ensure!(
            self.load.green.max_callers >= self.load.yellow.max_callers
                && self.load.yellow.max_callers >= self.load.red.max_callers
                && self.load.red.max_callers >= self.load.critical.max_callers,
            "load zone max_callers must not increase with severity"
        );
        for group in &self.groups {
            anyhow::ensure!(!group.name.is_empty(), "groups[].name must be non-empty");
            for device in &group.devices {
                anyhow::ensure!(
                    !device.address.is_empty(),
                    "device address in group {} must be non-empty",
                    group.name
                );
            }
        }
        Ok(())
    }
}
