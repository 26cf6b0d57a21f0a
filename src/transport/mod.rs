// Remote session transport: connector / shell seams plus the polling session on top of them.

mod session;
mod ssh;

pub use session::{OutputSize, ReadTiming, Session};
pub use ssh::SshConnector;

use std::future::Future;
use std::time::Duration;

use crate::error::SessionError;
use crate::models::{Credentials, Device};

/// Opens authenticated interactive shells. One call per session; nothing is pooled.
pub trait Connector: Send + Sync + 'static {
    type Shell: Shell;

    fn connect(
        &self,
        device: &Device,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Shell, SessionError>> + Send;
}

/// Raw byte channel of one interactive shell.
pub trait Shell: Send + 'static {
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Waits at most `wait` for the next chunk. `Ok(None)` means nothing arrived in time.
    fn read_chunk(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, SessionError>> + Send;

    /// Severs the channel. Must not fail.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}
