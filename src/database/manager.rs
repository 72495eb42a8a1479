use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{DatabaseConfig, SshConfig};
use crate::database::tunnel::{SshTunnel, TunnelError};

/// Errors from the connection manager and the store built on it
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query '{query}' timed out after {after:?}")]
    Timeout { query: &'static str, after: Duration },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Whether the failure came from reaching the database rather than the query itself
    pub fn is_connection(&self) -> bool {
        match self {
            DatabaseError::Tunnel(_) | DatabaseError::ConnectionError(_) => true,
            DatabaseError::Timeout { .. } => false,
            DatabaseError::Sqlx(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }
}

/// A fully established connection that can report its own health
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    fn is_healthy(&self) -> bool;

    /// Tear the connection down; called at most once per handle
    async fn close(&self);
}

/// Opens new connections for the manager
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Connection: Connection;

    async fn connect(&self) -> Result<Self::Connection, DatabaseError>;
}

/// Owns at most one live connection handle and hands out shared references to it.
///
/// `acquire` connects lazily and returns the existing handle while it stays
/// healthy. An unhealthy handle is closed and replaced on the next acquire.
/// `release` closes whatever is open and is a no-op otherwise.
pub struct ConnectionManager<C: Connect> {
    connector: C,
    current: Mutex<Option<Arc<C::Connection>>>,
}

impl<C: Connect> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            current: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) -> Result<Arc<C::Connection>, DatabaseError> {
        let mut current = self.current.lock().await;

        if let Some(handle) = current.as_ref() {
            if handle.is_healthy() {
                return Ok(handle.clone());
            }
            warn!("Connection handle unhealthy, reconnecting");
            if let Some(stale) = current.take() {
                stale.close().await;
            }
        }

        let handle = Arc::new(self.connector.connect().await?);
        *current = Some(handle.clone());
        Ok(handle)
    }

    pub async fn release(&self) {
        let handle = self.current.lock().await.take();
        if let Some(handle) = handle {
            handle.close().await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

/// SSH tunnel plus the MySQL pool that runs through it
pub struct TunneledConnection {
    tunnel: SshTunnel,
    pool: MySqlPool,
}

impl TunneledConnection {
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Connection for TunneledConnection {
    fn is_healthy(&self) -> bool {
        self.tunnel.is_alive() && !self.pool.is_closed()
    }

    async fn close(&self) {
        self.pool.close().await;
        self.tunnel.stop().await;
        info!("Closed database pool and tunnel");
    }
}

/// Opens the SSH tunnel, then a bounded pool through its local port
pub struct TunneledConnector {
    ssh: SshConfig,
    database: DatabaseConfig,
}

impl TunneledConnector {
    pub fn new(ssh: SshConfig, database: DatabaseConfig) -> Self {
        Self { ssh, database }
    }

    fn connect_options(&self, local_port: u16) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host("127.0.0.1")
            .port(local_port)
            .username(&self.database.user)
            .database(&self.database.name)
            .charset("utf8mb4");
        if let Some(password) = &self.database.password {
            options = options.password(password);
        }
        options
    }
}

#[async_trait]
impl Connect for TunneledConnector {
    type Connection = TunneledConnection;

    async fn connect(&self) -> Result<TunneledConnection, DatabaseError> {
        let limit = Duration::from_secs(self.database.connection_timeout);
        let tunnel = tokio::time::timeout(
            limit,
            SshTunnel::start(&self.ssh, &self.database.host, self.database.port),
        )
        .await
        .map_err(|_| {
            error!(
                "SSH handshake with {}:{} did not finish within {:?}",
                self.ssh.host, self.ssh.port, limit
            );
            DatabaseError::ConnectionError(format!(
                "SSH handshake with {}:{} timed out after {:?}",
                self.ssh.host, self.ssh.port, limit
            ))
        })??;

        let pool = MySqlPoolOptions::new()
            .max_connections(self.database.max_connections)
            .acquire_timeout(Duration::from_secs(self.database.connection_timeout))
            .connect_with(self.connect_options(tunnel.local_port()))
            .await;

        match pool {
            Ok(pool) => {
                info!(
                    "Connected to database '{}' through tunnel port {}",
                    self.database.name,
                    tunnel.local_port()
                );
                Ok(TunneledConnection { tunnel, pool })
            }
            Err(e) => {
                error!("Database connection through tunnel failed: {}", e);
                tunnel.stop().await;
                Err(DatabaseError::ConnectionError(e.to_string()))
            }
        }
    }
}

/// Manager type used by the running service
pub type DatabaseManager = ConnectionManager<TunneledConnector>;
