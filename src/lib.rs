//! demibot - a persistent IRC bot with hot-reloadable modules.
//!
//! The runtime is split into four parts:
//! - [`network`]: connection supervision, reconnect policy, the line session
//! - [`modules`]: module registry, lifecycle, dispatch, built-in modules
//! - [`permissions`]: nick-based permission tiers
//! - [`fetch`]: size- and time-bounded HTTP fetches for URL titles

pub mod config;
pub mod error;
pub mod fetch;
pub mod modules;
pub mod network;
pub mod permissions;
pub mod telemetry;
pub mod text;
