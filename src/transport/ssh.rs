// SSH connector (russh) with negotiation fallback for older switch firmware

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::keys::ssh_key::{Algorithm, HashAlg, PublicKey};
use russh::{Channel, ChannelMsg, Disconnect, Preferred, cipher, kex, mac};
use tokio::time::Instant;
use tracing::instrument;

use super::{Connector, Shell};
use crate::config::SshConfig;
use crate::error::SessionError;
use crate::models::{Credentials, Device};

/// Keyboard-interactive rounds answered before giving up.
const MAX_KBD_ROUNDS: usize = 4;

/// Tried in this order; the first that authenticates wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// russh defaults, password auth.
    Modern,
    /// Adds SHA-1 key exchange, CBC ciphers and `ssh-rsa` host keys, password auth.
    LegacyAlgorithms,
    /// Legacy-capable algorithm set with keyboard-interactive auth.
    KeyboardInteractive,
}

const STRATEGIES: [Strategy; 3] = [
    Strategy::Modern,
    Strategy::LegacyAlgorithms,
    Strategy::KeyboardInteractive,
];

impl Strategy {
    fn name(self) -> &'static str {
        match self {
            Strategy::Modern => "modern",
            Strategy::LegacyAlgorithms => "legacy_algorithms",
            Strategy::KeyboardInteractive => "keyboard_interactive",
        }
    }

    fn preferred(self) -> Preferred {
        match self {
            Strategy::Modern => Preferred::default(),
            Strategy::LegacyAlgorithms | Strategy::KeyboardInteractive => legacy_preferred(),
        }
    }
}

fn legacy_preferred() -> Preferred {
    Preferred {
        kex: Cow::Owned(vec![
            kex::CURVE25519,
            kex::DH_G14_SHA256,
            kex::DH_G14_SHA1,
            kex::DH_G1_SHA1,
            kex::EXTENSION_SUPPORT_AS_CLIENT,
        ]),
        key: Cow::Owned(vec![
            Algorithm::Ed25519,
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            },
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha256),
            },
            Algorithm::Rsa { hash: None },
        ]),
        cipher: Cow::Owned(vec![
            cipher::AES_128_CTR,
            cipher::AES_256_CTR,
            cipher::AES_128_CBC,
            cipher::AES_256_CBC,
        ]),
        mac: Cow::Owned(vec![mac::HMAC_SHA256, mac::HMAC_SHA1]),
        ..Preferred::default()
    }
}

/// Switches present self-generated host keys; the fingerprint is logged, not pinned.
struct SwitchHandler {
    device: String,
}

impl client::Handler for SwitchHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        tracing::debug!(
            device = %self.device,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting host key"
        );
        Ok(true)
    }
}

fn map_russh(e: russh::Error) -> SessionError {
    match e {
        russh::Error::IO(io) => SessionError::NetworkUnreachable(io.to_string()),
        other => SessionError::ProtocolError(other.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct SshConnector {
    port: u16,
    connect_timeout: Duration,
}

impl SshConnector {
    pub fn new(config: &SshConfig) -> Self {
        Self {
            port: config.port,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    async fn attempt(
        &self,
        device: &Device,
        credentials: &Credentials,
        strategy: Strategy,
    ) -> Result<SshShell, SessionError> {
        let config = Arc::new(client::Config {
            preferred: strategy.preferred(),
            inactivity_timeout: Some(Duration::from_secs(300)),
            ..Default::default()
        });
        let handler = SwitchHandler {
            device: device.address.clone(),
        };
        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, (device.address.as_str(), self.port), handler),
        )
        .await
        .map_err(|_| SessionError::Timeout(self.connect_timeout.as_millis() as u64))?
        .map_err(map_russh)?;

        let authenticated = match strategy {
            Strategy::Modern | Strategy::LegacyAlgorithms => handle
                .authenticate_password(credentials.username.clone(), credentials.password.clone())
                .await
                .map_err(map_russh)?
                .success(),
            Strategy::KeyboardInteractive => keyboard_interactive(&mut handle, credentials).await?,
        };
        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(SessionError::AuthenticationFailed(format!(
                "{} rejected credentials for {}",
                device.address, credentials.username
            )));
        }

        let channel = handle.channel_open_session().await.map_err(map_russh)?;
        channel
            .request_pty(false, "vt100", 200, 24, 0, 0, &[])
            .await
            .map_err(map_russh)?;
        channel.request_shell(false).await.map_err(map_russh)?;
        Ok(SshShell { handle, channel })
    }
}

async fn keyboard_interactive(
    handle: &mut Handle<SwitchHandler>,
    credentials: &Credentials,
) -> Result<bool, SessionError> {
    let mut response = handle
        .authenticate_keyboard_interactive_start(credentials.username.clone(), None::<String>)
        .await
        .map_err(map_russh)?;
    for _ in 0..MAX_KBD_ROUNDS {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                let answers = vec![credentials.password.clone(); prompts.len()];
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await
                    .map_err(map_russh)?;
            }
        }
    }
    Ok(matches!(response, KeyboardInteractiveAuthResponse::Success))
}

impl Connector for SshConnector {
    type Shell = SshShell;

    /// A different algorithm set cannot fix an unreachable host, so transport-level
    /// failures end the fallback early.
    #[instrument(skip_all, fields(device = %device.address, operation = "connect"))]
    async fn connect(&self, device: &Device, credentials: &Credentials) -> Result<SshShell, SessionError> {
        let mut last_error = SessionError::ProtocolError("no negotiation strategy attempted".into());
        for strategy in STRATEGIES {
            match self.attempt(device, credentials, strategy).await {
                Ok(shell) => {
                    tracing::debug!(strategy = strategy.name(), "ssh session established");
                    return Ok(shell);
                }
                Err(e @ (SessionError::NetworkUnreachable(_) | SessionError::Timeout(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(strategy = strategy.name(), error = %e, "negotiation strategy failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

pub struct SshShell {
    handle: Handle<SwitchHandler>,
    channel: Channel<Msg>,
}

impl Shell for SshShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.channel.data(data).await.map_err(map_russh)
    }

    async fn read_chunk(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, SessionError> {
        let deadline = Instant::now() + wait;
        loop {
            let Ok(msg) = tokio::time::timeout_at(deadline, self.channel.wait()).await else {
                return Ok(None);
            };
            match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(SessionError::Closed);
                }
                Some(_) => continue,
            }
        }
    }

    async fn disconnect(&mut self) {
        let _ = self.channel.eof().await;
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!(error = %e, "ssh disconnect failed");
        }
    }
}
