//! demibot - IRC bot runtime.
//!
//! Connects to every configured network and keeps the connections alive
//! until interrupted.

use anyhow::Context;
use clap::Parser;
use dashmap::DashMap;
use demibot::config::{self, Config};
use demibot::fetch::Fetcher;
use demibot::modules::{Capabilities, ModuleCatalog, ModulePattern, ModuleRuntime, spawn_watcher};
use demibot::network::{CONNECT_TIMEOUT, ClientTable, Supervisor, TcpConnector};
use demibot::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Time allowed for sessions to send QUIT after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// IRC bot with hot-reloadable modules
#[derive(Parser, Debug)]
#[command(name = "demibot")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Base directory; relative paths in the config resolve against it
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

async fn wait_all(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Supervisor task failed");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let verbosity = if args.quiet { -1 } else { args.verbose.min(2) as i8 };
    telemetry::init(verbosity);

    if let Some(dir) = &args.dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("cannot enter base directory {}", dir.display()))?;
    }

    let config = Config::load(&args.config).map_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!(
            "{} configuration error(s) in {}",
            errors.len(),
            args.config.display()
        );
    }

    info!(
        networks = config.networks.len(),
        module_dir = %config.modules.dir,
        "Starting demibot {}",
        env!("CARGO_PKG_VERSION")
    );

    let fetcher = Fetcher::from_config(&config.fetch)?;
    let connector = Arc::new(TcpConnector::new(CONNECT_TIMEOUT)?);
    let clients: ClientTable = Arc::new(DashMap::new());
    let catalog = ModuleCatalog::builtin();
    let pattern = ModulePattern::from(&config.modules);
    let poll_interval = Duration::from_secs(config.modules.poll_interval_secs);
    let shutdown = CancellationToken::new();

    let mut supervisors = Vec::with_capacity(config.networks.len());
    let mut tasks = JoinSet::new();
    for network in &config.networks {
        let network = Arc::new(network.clone());
        let caps = Capabilities::new(Arc::clone(&network), fetcher.clone());
        let runtime = Arc::new(ModuleRuntime::new(
            config.modules.dir(),
            pattern.clone(),
            catalog.clone(),
            caps,
        ));

        if !poll_interval.is_zero() {
            spawn_watcher(Arc::clone(&runtime), poll_interval, shutdown.child_token());
        }

        let supervisor = Supervisor::new(
            network,
            Arc::clone(&connector),
            Arc::clone(&clients),
            runtime,
            shutdown.child_token(),
        );
        tasks.spawn(Arc::clone(&supervisor).run());
        supervisors.push(supervisor);
    }

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
        }
        _ = wait_all(&mut tasks) => info!("All networks stopped"),
    }

    for supervisor in &supervisors {
        supervisor.shutdown();
    }
    shutdown.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, wait_all(&mut tasks))
        .await
        .is_err()
    {
        error!("Networks did not stop in time");
    }

    info!("demibot stopped");
    Ok(())
}
