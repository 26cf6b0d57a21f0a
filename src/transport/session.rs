// One interactive device session: banner drain, idle-timeout polling, pagination, best-effort close

use std::time::Duration;

use tokio::time::Instant;
use tracing::instrument;

use super::{Connector, Shell};
use crate::commands;
use crate::config::SshConfig;
use crate::device_limits::DevicePermit;
use crate::error::SessionError;
use crate::models::{Credentials, Device};

/// Pager prompts that interrupt long tables. Matched case-insensitively in the tail of the buffer.
const PAGER_PROMPTS: &[&str] = &["--more--", "-- more --", "more: <space>", "<--- more --->"];

/// Keystroke that advances the pager by one screen.
const PAGER_CONTINUE: &[u8] = b" ";

/// How much trailing output is searched for a pager prompt.
const PAGER_TAIL: usize = 64;

/// Selects the idle window: small replies settle quickly, tables trickle in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    Small,
    Bulk,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadTiming {
    pub idle: Duration,
    pub bulk_idle: Duration,
    pub max_wait: Duration,
    pub bulk_max_wait: Duration,
    pub banner_drain: Duration,
}

impl ReadTiming {
    fn windows(&self, size: OutputSize) -> (Duration, Duration) {
        match size {
            OutputSize::Small => (self.idle, self.max_wait),
            OutputSize::Bulk => (self.bulk_idle, self.bulk_max_wait),
        }
    }
}

impl From<&SshConfig> for ReadTiming {
    fn from(c: &SshConfig) -> Self {
        Self {
            idle: Duration::from_millis(c.idle_timeout_ms),
            bulk_idle: Duration::from_millis(c.bulk_idle_timeout_ms),
            max_wait: Duration::from_millis(c.max_wait_ms),
            bulk_max_wait: Duration::from_millis(c.bulk_max_wait_ms),
            banner_drain: Duration::from_millis(c.banner_drain_ms),
        }
    }
}

/// Exclusively owned by the task that opened it. Holds the device admission slot, so the
/// slot is released however the session ends.
pub struct Session<S: Shell> {
    shell: S,
    permit: DevicePermit,
    timing: ReadTiming,
}

/// Reports one command to device health tracking when dropped, including when the
/// sending future is cancelled mid-read.
struct CommandRecord<'a> {
    permit: &'a DevicePermit,
    success: bool,
}

impl Drop for CommandRecord<'_> {
    fn drop(&mut self) {
        self.permit
            .limiter()
            .record_command(self.permit.device(), self.success);
    }
}

impl<S: Shell> Session<S> {
    /// Connects, then drains the login banner so the first command starts clean.
    #[instrument(skip_all, fields(device = %device.address, operation = "open"))]
    pub async fn open<C>(
        connector: &C,
        device: &Device,
        credentials: &Credentials,
        permit: DevicePermit,
        timing: ReadTiming,
    ) -> Result<Self, SessionError>
    where
        C: Connector<Shell = S>,
    {
        let shell = match connector.connect(device, credentials).await {
            Ok(shell) => shell,
            Err(e) => {
                permit.limiter().record_command(permit.device(), false);
                tracing::warn!(error = %e, kind = e.kind(), "session open failed");
                return Err(e);
            }
        };
        let mut session = Self {
            shell,
            permit,
            timing,
        };
        let (idle, drain) = (session.timing.idle, session.timing.banner_drain);
        match session.collect(idle, drain).await {
            Ok(banner) => {
                tracing::debug!(banner_bytes = banner.len(), "banner drained");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "banner drain failed");
                session.shell.disconnect().await;
                Err(e)
            }
        }
    }

    pub fn device(&self) -> &str {
        self.permit.device()
    }

    /// Sends one command line and returns everything the device printed until it went quiet,
    /// minus the terminal's echo of the command.
    #[instrument(skip(self), fields(device = %self.permit.device()))]
    pub async fn send(&mut self, command: &str, size: OutputSize) -> Result<String, SessionError> {
        let mut record = CommandRecord {
            permit: &self.permit,
            success: false,
        };
        let (idle, max_wait) = self.timing.windows(size);
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.shell.write(&line).await?;
        let output = Self::poll(&mut self.shell, idle, max_wait).await?;
        record.success = true;
        Ok(strip_echo(output, command))
    }

    async fn collect(&mut self, idle: Duration, max_wait: Duration) -> Result<String, SessionError> {
        Self::poll(&mut self.shell, idle, max_wait).await
    }

    /// Reads until nothing arrives for `idle`, or `max_wait` has passed in total.
    async fn poll(shell: &mut S, idle: Duration, max_wait: Duration) -> Result<String, SessionError> {
        let deadline = Instant::now() + max_wait;
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(
                    max_wait_ms = max_wait.as_millis() as u64,
                    bytes = buf.len(),
                    "absolute read limit reached"
                );
                break;
            }
            let wait = idle.min(deadline - now);
            match shell.read_chunk(wait).await? {
                Some(chunk) => {
                    buf.extend_from_slice(&chunk);
                    if strip_pager_prompt(&mut buf) {
                        shell.write(PAGER_CONTINUE).await?;
                    }
                }
                None => break,
            }
        }
        Ok(clean_output(&buf))
    }

    /// Best-effort logout, then disconnect. Never fails.
    #[instrument(skip(self), fields(device = %self.permit.device(), operation = "close"))]
    pub async fn close(mut self) {
        let logout = format!("{}\n", commands::LOGOUT);
        if let Err(e) = self.shell.write(logout.as_bytes()).await {
            tracing::debug!(error = %e, "logout failed, disconnecting anyway");
        }
        self.shell.disconnect().await;
    }
}

/// Removes a trailing pager prompt. Returns whether one was found.
fn strip_pager_prompt(buf: &mut Vec<u8>) -> bool {
    let start = buf.len().saturating_sub(PAGER_TAIL);
    let tail = String::from_utf8_lossy(&buf[start..]).to_ascii_lowercase();
    let Some(pos) = PAGER_PROMPTS.iter().filter_map(|p| tail.find(p)).min() else {
        return false;
    };
    // `pos` indexes the lossy string; only equal to a byte offset when the tail is ASCII.
    if buf[start..].is_ascii() {
        buf.truncate(start + pos);
    }
    true
}

/// Drops the first non-blank line when it is the echoed command, with or without a prompt.
fn strip_echo(output: String, command: &str) -> String {
    let sent = command.trim();
    if sent.is_empty() {
        return output;
    }
    let mut offset = 0;
    for line in output.split_inclusive('\n') {
        if line.trim().is_empty() {
            offset += line.len();
            continue;
        }
        if line.trim_end().ends_with(sent) {
            return output[offset + line.len()..].to_string();
        }
        break;
    }
    output
}

/// Drops carriage returns and the backspace runs some firmware uses to erase the pager prompt.
fn clean_output(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .chars()
        .filter(|c| *c != '\r' && *c != '\u{8}')
        .collect()
}
