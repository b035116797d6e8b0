//! Configuration loading for the relay daemon.
//!
//! Configuration is loaded from a TOML file (default: `ocsrelay.toml`).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration for the relay daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Concurrency limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Authorization configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Accounts the relay can perform requests for.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Path of the Unix socket callers connect to.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

/// Concurrency limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum relay cycles running at once. Each caller gets its own
    /// worker; this cap keeps a slow upstream from starving the accept
    /// loop (default: 16).
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

/// Authorization configuration.
///
/// `tokens` is the persisted application-to-secret mapping written by the
/// out-of-band pairing flow; `callers` maps OS caller identities to package
/// identifiers for requests that arrive without an explicit package name.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Static allow-list of package identifiers permitted to use the relay.
    #[serde(default = "default_allowed_packages")]
    pub allowed_packages: Vec<String>,
    /// Package identifier -> paired secret token.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// Caller uid (as a string, TOML keys are strings) -> package identifier.
    #[serde(default)]
    pub callers: HashMap<String, String>,
}

/// One relayable account and its endpoint credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Account name callers reference in their requests.
    pub name: String,
    /// Base endpoint all relative request URLs are rewritten against.
    pub base_url: String,
    /// Username for upstream Basic authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// App password for upstream Basic authentication.
    #[serde(default)]
    pub app_password: Option<String>,
    /// Upstream request timeout in seconds. Absent means no timeout; the
    /// relay itself never enforces one.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

// Default value functions
fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/ocsrelay.sock")
}

fn default_max_concurrent_requests() -> usize {
    16
}

fn default_allowed_packages() -> Vec<String> {
    vec!["de.luhmer.owncloudnewsreader".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_packages: default_allowed_packages(),
            tokens: HashMap::new(),
            callers: HashMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: LimitsConfig::default(),
            auth: AuthConfig::default(),
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
