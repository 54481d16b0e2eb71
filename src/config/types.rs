//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Module directory and naming convention.
    #[serde(default)]
    pub modules: ModulesConfig,
    /// Outbound HTTP settings for URL lookups.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// One block per network to connect to.
    #[serde(default, rename = "network")]
    pub networks: Vec<NetworkConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Per-network settings.
///
/// Immutable for the lifetime of one run.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Network identity (e.g., "libera"). Keys the live client table.
    pub name: String,
    /// Server hostname.
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whether to connect with TLS.
    #[serde(default)]
    pub tls: bool,
    /// Server password sent with PASS.
    #[serde(default)]
    pub password: Option<String>,
    /// Nickname to register with.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Username for USER. Defaults to the nick.
    #[serde(default)]
    pub username: Option<String>,
    /// Realname for USER. Defaults to the nick.
    #[serde(default)]
    pub realname: Option<String>,
    /// Channels to join after registration.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Nicks with admin permissions (tier 10).
    #[serde(default)]
    pub admins: Vec<String>,
    /// Nicks with superadmin permissions (tier 20).
    #[serde(default)]
    pub superadmins: Vec<String>,
    /// Seconds to wait before reconnecting after a lost connection.
    #[serde(default = "default_lost_delay")]
    pub lost_delay: u64,
    /// Seconds to wait before retrying a failed connection attempt.
    #[serde(default = "default_failed_delay")]
    pub failed_delay: u64,
    /// Callers below this tier may not use tier-gated modules. 0 disables the gate.
    #[serde(default)]
    pub minperms: u8,
    /// Whether the urltitle module answers links posted in channels.
    #[serde(default)]
    pub urltitles_enabled: bool,
    /// Suppress chat line logging for this network.
    #[serde(default)]
    pub nologs: bool,
}

impl NetworkConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nick)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nick)
    }

    pub fn lost_delay(&self) -> Duration {
        Duration::from_secs(self.lost_delay)
    }

    pub fn failed_delay(&self) -> Duration {
        Duration::from_secs(self.failed_delay)
    }

    pub fn logs_enabled(&self) -> bool {
        !self.nologs
    }
}

/// Module directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesConfig {
    /// Directory scanned for module files.
    #[serde(default = "default_module_dir")]
    pub dir: String,
    /// File name prefix a module file must carry.
    #[serde(default = "default_module_prefix")]
    pub prefix: String,
    /// File name suffix a module file must carry.
    #[serde(default = "default_module_suffix")]
    pub suffix: String,
    /// Seconds between directory scans. 0 disables the watcher.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            dir: default_module_dir(),
            prefix: default_module_prefix(),
            suffix: default_module_suffix(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl ModulesConfig {
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// User agent pinned on every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Verify TLS certificates. Off by default for compatibility with the
    /// self-signed hosts people tend to paste.
    #[serde(default)]
    pub verify_tls: bool,
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Responses declaring more than this many KiB are not read.
    #[serde(default = "default_max_content_kib")]
    pub max_content_kib: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            verify_tls: false,
            timeout_secs: default_fetch_timeout(),
            max_content_kib: default_max_content_kib(),
        }
    }
}
