use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration errors. Any of these aborts the process before the
/// server binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("SSH credentials missing: set SSH_PASSWORD or SSH_PKEY")]
    MissingSshCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub ssh: SshConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// How the tunnel authenticates against the SSH host
#[derive(Clone, Serialize, Deserialize)]
pub enum SshAuth {
    Password(String),
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl std::fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SshAuth::Password(_) => f.write_str("Password(***)"),
            SshAuth::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    /// Expected server key fingerprint; any key is accepted when unset
    pub host_fingerprint: Option<String>,
    pub keepalive_secs: u64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host as seen from the SSH server
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub query_timeout_ms: u64,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold_ms: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("connection_timeout", &self.connection_timeout)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Empty or `*` means any origin
    pub cors_origins: Vec<String>,
}

/// Environment-independent defaults; credentials are filled in by `from_source`
struct Preset {
    database: PresetDatabase,
    api: ApiConfig,
    security: SecurityConfig,
    keepalive_secs: u64,
}

struct PresetDatabase {
    max_connections: u32,
    connection_timeout: u64,
    query_timeout_ms: u64,
    enable_slow_query_warning: bool,
    slow_query_threshold_ms: u64,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        let environment = match var("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let preset = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        let ssh_auth = match (var("SSH_PASSWORD"), var("SSH_PKEY")) {
            (Some(password), _) => SshAuth::Password(password),
            (None, Some(path)) => SshAuth::PrivateKey {
                path: PathBuf::from(path),
                passphrase: var("SSH_PKEY_PASSPHRASE"),
            },
            (None, None) => return Err(ConfigError::MissingSshCredentials),
        };

        let ssh = SshConfig {
            host: var("SSH_HOST").ok_or(ConfigError::Missing("SSH_HOST"))?,
            port: parse_or("SSH_PORT", var("SSH_PORT"), 22)?,
            user: var("SSH_USER").ok_or(ConfigError::Missing("SSH_USER"))?,
            auth: ssh_auth,
            host_fingerprint: var("SSH_HOST_FINGERPRINT"),
            keepalive_secs: preset.keepalive_secs,
        };

        let db = preset.database;
        let database = DatabaseConfig {
            host: var("MYSQL_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or("MYSQL_PORT", var("MYSQL_PORT"), 3306)?,
            user: var("MYSQL_USER").ok_or(ConfigError::Missing("MYSQL_USER"))?,
            password: var("MYSQL_PASSWORD"),
            name: var("MYSQL_DB").ok_or(ConfigError::Missing("MYSQL_DB"))?,
            max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                var("DATABASE_MAX_CONNECTIONS"),
                db.max_connections,
            )?,
            connection_timeout: parse_or(
                "DATABASE_CONNECTION_TIMEOUT",
                var("DATABASE_CONNECTION_TIMEOUT"),
                db.connection_timeout,
            )?,
            query_timeout_ms: parse_or(
                "DATABASE_QUERY_TIMEOUT_MS",
                var("DATABASE_QUERY_TIMEOUT_MS"),
                db.query_timeout_ms,
            )?,
            enable_slow_query_warning: parse_or(
                "DATABASE_ENABLE_SLOW_QUERY_WARNING",
                var("DATABASE_ENABLE_SLOW_QUERY_WARNING"),
                db.enable_slow_query_warning,
            )?,
            slow_query_threshold_ms: parse_or(
                "DATABASE_SLOW_QUERY_THRESHOLD_MS",
                var("DATABASE_SLOW_QUERY_THRESHOLD_MS"),
                db.slow_query_threshold_ms,
            )?,
        };

        let mut api = preset.api;
        if let Some(port) = var("API_PORT").or_else(|| var("PORT")) {
            api.port = parse_or("API_PORT", Some(port), api.port)?;
        }
        if let Some(v) = var("API_ENABLE_REQUEST_LOGGING") {
            api.enable_request_logging =
                parse_or("API_ENABLE_REQUEST_LOGGING", Some(v), api.enable_request_logging)?;
        }

        let mut security = preset.security;
        if let Some(v) = var("SECURITY_CORS_ORIGINS") {
            security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(Self {
            environment,
            ssh,
            database,
            api,
            security,
        })
    }

    fn development() -> Preset {
        Preset {
            database: PresetDatabase {
                max_connections: 5,
                connection_timeout: 30,
                query_timeout_ms: 10_000,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 200,
            },
            api: ApiConfig {
                port: 5000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: Vec::new(),
            },
            keepalive_secs: 30,
        }
    }

    fn staging() -> Preset {
        Preset {
            database: PresetDatabase {
                max_connections: 10,
                connection_timeout: 10,
                query_timeout_ms: 5_000,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 500,
            },
            api: ApiConfig {
                port: 5000,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                cors_origins: Vec::new(),
            },
            keepalive_secs: 30,
        }
    }

    fn production() -> Preset {
        Preset {
            database: PresetDatabase {
                max_connections: 20,
                connection_timeout: 5,
                query_timeout_ms: 3_000,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 1000,
            },
            api: ApiConfig {
                port: 5000,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                cors_origins: Vec::new(),
            },
            keepalive_secs: 15,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
