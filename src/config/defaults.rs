//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Network Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

pub fn default_nick() -> String {
    "demibot".to_string()
}

/// Seconds to wait before reconnecting after an established session drops.
pub fn default_lost_delay() -> u64 {
    10
}

/// Seconds to wait before retrying a connection attempt that failed outright.
pub fn default_failed_delay() -> u64 {
    30
}

// =============================================================================
// Module Defaults
// =============================================================================

pub fn default_module_dir() -> String {
    "modules".to_string()
}

pub fn default_module_prefix() -> String {
    "module_".to_string()
}

pub fn default_module_suffix() -> String {
    ".toml".to_string()
}

pub fn default_poll_interval() -> u64 {
    5
}

// =============================================================================
// Fetch Defaults
// =============================================================================

pub fn default_user_agent() -> String {
    crate::fetch::DEFAULT_USER_AGENT.to_string()
}

pub fn default_fetch_timeout() -> u64 {
    10
}

pub fn default_max_content_kib() -> u64 {
    crate::fetch::MAX_CONTENT_KIB
}
