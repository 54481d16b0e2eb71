//! Integration test common infrastructure.
//!
//! Provides a scripted transport standing in for IRC servers, a stub HTTP
//! transport that counts body reads, and modules that record their
//! lifecycle.

pub mod modules;
pub mod server;
pub mod transport;

#[allow(unused_imports)]
pub use transport::StubTransport;
#[allow(unused_imports)]
pub use modules::{Recorder, recording_catalog};
#[allow(unused_imports)]
pub use server::{ScriptedConnector, TestServer};

use demibot::config::NetworkConfig;
use demibot::fetch::{FetchSettings, Fetcher};
use demibot::modules::{Capabilities, ModuleCatalog, ModulePattern, ModuleRuntime};
use std::path::Path;
use std::sync::Arc;

/// Build a network config from extra TOML lines.
#[allow(dead_code)]
pub fn network(extra: &str) -> Arc<NetworkConfig> {
    let toml = format!("name = \"testnet\"\nhost = \"irc.test\"\nnick = \"bot\"\n{extra}");
    Arc::new(toml::from_str(&toml).expect("valid network config"))
}

/// Capabilities whose fetches all hit `transport`.
#[allow(dead_code)]
pub fn caps(network: Arc<NetworkConfig>, transport: StubTransport) -> Capabilities {
    Capabilities::new(
        network,
        Fetcher::new(Arc::new(transport), FetchSettings::default()),
    )
}

/// A runtime over `dir` with the default file pattern.
#[allow(dead_code)]
pub fn runtime(dir: &Path, catalog: ModuleCatalog, caps: Capabilities) -> Arc<ModuleRuntime> {
    Arc::new(ModuleRuntime::new(
        dir,
        ModulePattern::default(),
        catalog,
        caps,
    ))
}

/// Write a module file into `dir`.
#[allow(dead_code)]
pub fn write_module(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("write module file");
}
