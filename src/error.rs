//! Unified error handling for demibot.
//!
//! Errors are grouped by the boundary they cross: module lifecycle and
//! dispatch, outbound HTTP fetches, and connection setup. Each carries a
//! static code used as a structured logging field.

use thiserror::Error;

// ============================================================================
// Module Errors (load, init, finalize, dispatch)
// ============================================================================

/// Errors raised while loading or running a module.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to read module source: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid module source: {0}")]
    Source(#[from] toml::de::Error),

    #[error("unknown module kind: {0}")]
    UnknownKind(String),

    #[error("invalid setting {key}: {reason}")]
    Setting { key: String, reason: String },

    #[error("module panicked")]
    Panicked,

    #[error("{0}")]
    Handler(String),
}

impl ModuleError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Source(_) => "source",
            Self::UnknownKind(_) => "unknown_kind",
            Self::Setting { .. } => "setting",
            Self::Panicked => "panicked",
            Self::Handler(_) => "handler",
        }
    }
}

// ============================================================================
// Fetch Errors (outbound HTTP)
// ============================================================================

/// Errors from the bounded fetch utility.
///
/// These never reach module code; the fetcher logs them and returns `None`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid scheme in URI: {0}")]
    InvalidScheme(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("content too large: {kib}kB")]
    TooLarge { kib: u64 },

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidScheme(_) => "invalid_scheme",
            Self::Connect(_) => "connect",
            Self::Timeout => "timeout",
            Self::TooLarge { .. } => "too_large",
            Self::Status(_) => "status",
            Self::Body(_) => "body",
        }
    }
}

// ============================================================================
// Connection Errors (transport setup)
// ============================================================================

/// Errors establishing a transport to a network.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("TLS handshake failed: {0}")]
    Tls(String),
}
