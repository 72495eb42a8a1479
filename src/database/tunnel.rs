use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use russh_keys::key;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{SshAuth, SshConfig};

/// Errors raised while opening or running the SSH tunnel
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("SSH connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: russh::Error,
    },

    #[error("SSH authentication rejected for user '{0}'")]
    AuthRejected(String),

    #[error("Failed to load private key: {0}")]
    Key(#[from] russh_keys::Error),

    #[error("Tunnel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ssh(#[from] russh::Error),
}

/// Client handler; verifies the server key against an optional pinned fingerprint
struct TunnelClient {
    expected_fingerprint: Option<String>,
}

#[async_trait]
impl client::Handler for TunnelClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        match &self.expected_fingerprint {
            Some(expected) => {
                let accepted = expected.trim_start_matches("SHA256:") == fingerprint;
                if !accepted {
                    warn!("SSH host key mismatch: got SHA256:{}", fingerprint);
                }
                Ok(accepted)
            }
            None => {
                debug!("Accepting SSH host key SHA256:{}", fingerprint);
                Ok(true)
            }
        }
    }
}

/// Local port forward to a remote host:port over one SSH session.
///
/// Every connection accepted on `local_addr` is carried to the remote
/// endpoint over its own `direct-tcpip` channel.
pub struct SshTunnel {
    session: Arc<Handle<TunnelClient>>,
    local_addr: SocketAddr,
    forwarder: JoinHandle<()>,
}

impl SshTunnel {
    /// Connect, authenticate and start forwarding from an ephemeral local port
    pub async fn start(
        ssh: &SshConfig,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Self, TunnelError> {
        let config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(ssh.keepalive_secs)),
            // Unanswered keepalives close the session so the manager can reconnect
            inactivity_timeout: Some(Duration::from_secs(ssh.keepalive_secs.saturating_mul(3))),
            ..Default::default()
        });
        let handler = TunnelClient {
            expected_fingerprint: ssh.host_fingerprint.clone(),
        };

        let mut session = client::connect(config, (ssh.host.as_str(), ssh.port), handler)
            .await
            .map_err(|source| TunnelError::Connect {
                host: ssh.host.clone(),
                port: ssh.port,
                source,
            })?;

        let authenticated = match &ssh.auth {
            SshAuth::Password(password) => {
                session
                    .authenticate_password(ssh.user.as_str(), password.as_str())
                    .await?
            }
            SshAuth::PrivateKey { path, passphrase } => {
                let key_pair = russh_keys::load_secret_key(path, passphrase.as_deref())?;
                session
                    .authenticate_publickey(ssh.user.as_str(), Arc::new(key_pair))
                    .await?
            }
        };
        if !authenticated {
            return Err(TunnelError::AuthRejected(ssh.user.clone()));
        }

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        let session = Arc::new(session);

        let forwarder = tokio::spawn(forward_loop(
            listener,
            session.clone(),
            remote_host.to_string(),
            remote_port,
        ));

        info!(
            "SSH tunnel up: {} -> {}:{} via {}@{}:{}",
            local_addr, remote_host, remote_port, ssh.user, ssh.host, ssh.port
        );

        Ok(Self {
            session,
            local_addr,
            forwarder,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// True while the SSH session is open and the accept loop is running
    pub fn is_alive(&self) -> bool {
        !self.forwarder.is_finished() && !self.session.is_closed()
    }

    /// Stop accepting local connections and close the SSH session
    pub async fn stop(&self) {
        self.forwarder.abort();
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "tunnel closed", "en")
            .await
        {
            debug!("SSH disconnect returned: {}", e);
        }
        info!("SSH tunnel on {} stopped", self.local_addr);
    }
}

async fn forward_loop(
    listener: TcpListener,
    session: Arc<Handle<TunnelClient>>,
    remote_host: String,
    remote_port: u16,
) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Tunnel accept failed: {}", e);
                return;
            }
        };

        let session = session.clone();
        let remote_host = remote_host.clone();
        tokio::spawn(async move {
            if let Err(e) = forward_one(socket, peer, &session, &remote_host, remote_port).await {
                debug!("Tunnel stream from {} ended with error: {}", peer, e);
            }
        });
    }
}

async fn forward_one(
    mut socket: TcpStream,
    peer: SocketAddr,
    session: &Handle<TunnelClient>,
    remote_host: &str,
    remote_port: u16,
) -> Result<(), TunnelError> {
    let channel = session
        .channel_open_direct_tcpip(
            remote_host,
            u32::from(remote_port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await?;

    let mut stream = channel.into_stream();
    tokio::io::copy_bidirectional(&mut socket, &mut stream).await?;
    Ok(())
}
