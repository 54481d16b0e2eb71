//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, NetworkConfig, ModulesConfig, FetchConfig)
//! - [`defaults`]: Default values used by serde
//! - [`validation`]: Startup validation of a loaded config

mod defaults;
mod types;
pub mod validation;

pub use types::{Config, ConfigError, FetchConfig, ModulesConfig, NetworkConfig};
pub use validation::{ValidationError, validate};
