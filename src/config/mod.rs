//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (applied by the binary)

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::protocol::{Credentials, Disposition, SessionConfig};

/// Default authority host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default authority port
pub const DEFAULT_PORT: u16 = 3000;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Authority address
    #[serde(default)]
    pub server: ServerConfig,

    /// Client identification
    #[serde(default)]
    pub client: ClientConfig,

    /// Account credentials
    #[serde(default)]
    pub account: AccountConfig,

    /// Session failure handling
    #[serde(default)]
    pub session: SessionPolicy,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AuthError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| AuthError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Default config file location (`<config dir>/authlink/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("authlink").join("config.toml"))
    }

    /// Load from `path`, or from the default location if it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => {
                    tracing::debug!("Loading config from {}", path.display());
                    Self::from_file(path)?
                },
                _ => Self::default(),
            },
        };
        Ok(config.with_env_overrides())
    }

    /// Overlay `AUTHLINK_*` environment variables
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("AUTHLINK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("AUTHLINK_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid AUTHLINK_PORT '{}'", port),
            }
        }
        if let Some(version) = lookup("AUTHLINK_CLIENT_VERSION") {
            self.client.version = version;
        }
        if let Some(username) = lookup("AUTHLINK_USERNAME") {
            self.account.username = username;
        }
        if let Some(password) = lookup("AUTHLINK_PASSWORD") {
            self.account.password = password;
        }
        self
    }

    /// Session settings derived from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_client_version(self.client.version.clone())
            .with_decode_failure(self.session.decode_failure)
            .with_unknown_login_result(self.session.unknown_login_result)
    }

    /// Credentials derived from this config
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.account.username.clone(), self.account.password.clone())
    }
}

/// Authority address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or IP
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Version reported in the device check
    pub version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: crate::VERSION.to_string(),
        }
    }
}

/// Account credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Account name
    pub username: String,

    /// Account password
    pub password: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session failure handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// What to do with packets that fail to decode
    pub decode_failure: Disposition,

    /// What to do with login results outside the known set
    pub unknown_login_result: Disposition,
}
