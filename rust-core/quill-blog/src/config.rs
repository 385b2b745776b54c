//! Application configuration.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. an optional JSON override file, deep-merged object by object
//! 3. environment variables (`.env` is loaded first when present):
//!    `DATABASE_URL`, `QUILL_SECRET`, `QUILL_HOST`, `QUILL_PORT`

use quill_core::{PoolConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Override file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Override or merged document is not a valid configuration
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Environment variable holds an unusable value
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Largest accepted request body
    pub max_body_size: usize,
}

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSection {
    /// Connection URL (`sqlite:` or `postgres://`)
    pub url: String,
    /// Pool ceiling
    pub max_connections: u32,
    /// Idle connections kept open
    pub min_connections: u32,
    /// Seconds a statement waits for a connection
    pub acquire_timeout_secs: u64,
    /// Create missing tables at startup
    pub init_schema: bool,
}

/// Session cookie settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSection {
    /// Server secret mixed into cookie digests
    pub secret: String,
    /// Cookie name
    pub cookie_name: String,
    /// Cookie lifetime in seconds
    pub max_age_secs: i64,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Debug mode
    pub debug: bool,
    /// HTTP listener
    pub server: ServerSection,
    /// Database
    pub db: DbSection,
    /// Session cookies
    pub session: SessionSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: true,
            server: ServerSection {
                host: "127.0.0.1".to_string(),
                port: 9000,
                max_body_size: 1024 * 1024,
            },
            db: DbSection {
                url: "sqlite://quill.db?mode=rwc".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_secs: 30,
                init_schema: true,
            },
            session: SessionSection {
                secret: "Awesome".to_string(),
                cookie_name: "awesession".to_string(),
                max_age_secs: 86400,
            },
        }
    }
}

impl Config {
    /// Load from defaults, an optional override file and the process environment
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load(override_path: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let overrides = match override_path {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?),
            None => None,
        };
        Self::from_sources(overrides.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from an optional JSON override document and an environment lookup
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_sources(
        overrides: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(Self::default())?;
        if let Some(text) = overrides {
            merge(&mut merged, serde_json::from_str(text)?);
        }
        let mut config: Self = serde_json::from_value(merged)?;

        if let Some(url) = env("DATABASE_URL") {
            config.db.url = url;
        }
        if let Some(secret) = env("QUILL_SECRET") {
            config.session.secret = secret;
        }
        if let Some(host) = env("QUILL_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env("QUILL_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key: "QUILL_PORT", value: port })?;
        }
        Ok(config)
    }

    /// Core server settings
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidEnv` when the host is not an IP address.
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| ConfigError::InvalidEnv {
            key: "QUILL_HOST",
            value: self.server.host.clone(),
        })?;
        Ok(ServerConfig {
            address: SocketAddr::new(ip, self.server.port),
            max_body_size: self.server.max_body_size,
            ..ServerConfig::default()
        })
    }

    /// Core pool settings
    #[must_use]
    pub const fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.db.max_connections,
            min_connections: self.db.min_connections,
            acquire_timeout: Duration::from_secs(self.db.acquire_timeout_secs),
        }
    }
}

/// Deep-merge `overrides` into `base`: objects merge key by key, anything
/// else replaces
pub fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
