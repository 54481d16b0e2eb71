//! Polls the module directory and applies changes to a runtime.
//!
//! A change that only removed files retires those units. Anything else
//! (a new file, a modified file, a mix) triggers a full reload.

use super::ModuleRuntime;
use super::runtime::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a directory change asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Removed,
    Reload,
}

/// Compare two directory snapshots.
pub fn classify(previous: &Snapshot, current: &Snapshot) -> Change {
    if previous == current {
        Change::Unchanged
    } else if current
        .iter()
        .all(|(name, modified)| previous.get(name) == Some(modified))
    {
        Change::Removed
    } else {
        Change::Reload
    }
}

/// Spawn the polling task for one runtime.
///
/// Stops when `shutdown` is cancelled.
pub fn spawn_watcher(
    runtime: Arc<ModuleRuntime>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut previous = runtime.snapshot().await.unwrap_or_default();
        info!(
            network = %runtime.caps().network_name(),
            interval_secs = interval.as_secs(),
            "Module watcher started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let current = match runtime.snapshot().await {
                Ok(current) => current,
                Err(e) => {
                    warn!(error = %e, "Failed to scan module directory");
                    continue;
                }
            };

            match classify(&previous, &current) {
                Change::Unchanged => {}
                Change::Removed => {
                    let removed = runtime.retire_removed().await;
                    debug!(count = removed.len(), "Module files removed");
                }
                Change::Reload => {
                    let summary = runtime.reload_all().await;
                    info!(
                        loaded = summary.loaded.len(),
                        failed = summary.failed.len(),
                        "Modules reloaded after directory change"
                    );
                }
            }
            previous = current;
        }

        debug!("Module watcher stopped");
    })
}
