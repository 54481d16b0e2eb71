//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::permissions::SUPERADMIN;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("at least one [[network]] block is required")]
    NoNetworks,
    #[error("network name is required")]
    MissingNetworkName,
    #[error("duplicate network name: {0}")]
    DuplicateNetwork(String),
    #[error("network {0}: host is required")]
    MissingHost(String),
    #[error("network {0}: nick is required")]
    MissingNick(String),
    #[error("network {0}: port must be non-zero")]
    InvalidPort(String),
    #[error("network {network}: minperms must be at most {max}, got {got}")]
    MinpermsOutOfRange { network: String, max: u8, got: u8 },
    #[error("network {network}: {field} must be at least 1 second")]
    ZeroDelay {
        network: String,
        field: &'static str,
    },
    #[error("modules.dir does not exist: {0}")]
    ModuleDirNotFound(String),
    #[error("modules.prefix must not be empty")]
    EmptyModulePrefix,
    #[error("fetch.timeout_secs must be non-zero")]
    ZeroFetchTimeout,
    #[error("fetch.max_content_kib must be non-zero")]
    ZeroContentCap,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.networks.is_empty() {
        errors.push(ValidationError::NoNetworks);
    }

    let mut seen = HashSet::new();
    for net in &config.networks {
        if net.name.is_empty() {
            errors.push(ValidationError::MissingNetworkName);
        } else if !seen.insert(net.name.as_str()) {
            errors.push(ValidationError::DuplicateNetwork(net.name.clone()));
        }
        if net.host.is_empty() {
            errors.push(ValidationError::MissingHost(net.name.clone()));
        }
        if net.nick.is_empty() {
            errors.push(ValidationError::MissingNick(net.name.clone()));
        }
        if net.port == 0 {
            errors.push(ValidationError::InvalidPort(net.name.clone()));
        }
        if net.minperms > SUPERADMIN {
            errors.push(ValidationError::MinpermsOutOfRange {
                network: net.name.clone(),
                max: SUPERADMIN,
                got: net.minperms,
            });
        }
        if net.lost_delay == 0 {
            errors.push(ValidationError::ZeroDelay {
                network: net.name.clone(),
                field: "lost_delay",
            });
        }
        if net.failed_delay == 0 {
            errors.push(ValidationError::ZeroDelay {
                network: net.name.clone(),
                field: "failed_delay",
            });
        }
    }

    if !Path::new(&config.modules.dir).is_dir() {
        errors.push(ValidationError::ModuleDirNotFound(config.modules.dir.clone()));
    }
    if config.modules.prefix.is_empty() {
        errors.push(ValidationError::EmptyModulePrefix);
    }

    if config.fetch.timeout_secs == 0 {
        errors.push(ValidationError::ZeroFetchTimeout);
    }
    if config.fetch.max_content_kib == 0 {
        errors.push(ValidationError::ZeroContentCap);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
