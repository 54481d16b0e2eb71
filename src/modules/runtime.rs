//! Per-network module registry: discovery, reload, retirement, dispatch.
//!
//! Each network owns one [`ModuleRuntime`]. Units are keyed by file name and
//! every unit gets its own instance, so unloading one cannot disturb another.
//!
//! # Concurrency
//!
//! Reload and retire cycles are serialized by a cycle lock and hold the
//! registry write lock for their duration. Dispatch snapshots the registry,
//! then takes each unit's gate in shared mode for the call. Finalization
//! takes the gate exclusively and marks the unit retired, so a unit never
//! handles a message once its `finalize` has started, and `finalize` never
//! runs while a handler of the same unit is still in flight.

use super::{Capabilities, Effect, Incoming, Module, ModuleCatalog, ModuleSettings};
use crate::config::ModulesConfig;
use crate::error::ModuleError;
use crate::permissions::{self, may_invoke};
use crate::telemetry::spans;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument, debug, error, info, trace};

/// File name pattern marking a module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePattern {
    pub prefix: String,
    pub suffix: String,
}

impl Default for ModulePattern {
    fn default() -> Self {
        Self {
            prefix: "module_".to_string(),
            suffix: ".toml".to_string(),
        }
    }
}

impl From<&ModulesConfig> for ModulePattern {
    fn from(config: &ModulesConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            suffix: config.suffix.clone(),
        }
    }
}

impl ModulePattern {
    pub fn matches(&self, file_name: &str) -> bool {
        self.kind_of(file_name).is_some()
    }

    /// The part between prefix and suffix (`module_ping.toml` gives `ping`).
    pub fn kind_of<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let stem = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if stem.is_empty() { None } else { Some(stem) }
    }
}

/// Module file names mapped to their modification times.
pub type Snapshot = BTreeMap<String, Option<SystemTime>>;

/// Outcome of a reload cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub finalized: usize,
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
}

/// A loaded unit as reported to `.modules`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub id: String,
    pub kind: String,
    pub loaded_at: DateTime<Utc>,
}

struct Instance {
    module: Box<dyn Module>,
    gate: RwLock<()>,
    retired: AtomicBool,
}

struct ModuleUnit {
    kind: String,
    instance: Arc<Instance>,
    loaded_at: DateTime<Utc>,
}

/// Runs a module call, turning a panic into [`ModuleError::Panicked`].
async fn guarded<T, F>(call: F) -> Result<T, ModuleError>
where
    F: Future<Output = Result<T, ModuleError>>,
{
    AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or(Err(ModuleError::Panicked))
}

/// The module registry of one network.
pub struct ModuleRuntime {
    dir: PathBuf,
    pattern: ModulePattern,
    catalog: ModuleCatalog,
    caps: Capabilities,
    registry: RwLock<HashMap<String, ModuleUnit>>,
    cycle: Mutex<()>,
}

impl ModuleRuntime {
    pub fn new(
        dir: impl Into<PathBuf>,
        pattern: ModulePattern,
        catalog: ModuleCatalog,
        caps: Capabilities,
    ) -> Self {
        Self {
            dir: dir.into(),
            pattern,
            catalog,
            caps,
            registry: RwLock::new(HashMap::new()),
            cycle: Mutex::new(()),
        }
    }

    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }

    /// Scan the module directory for files matching the pattern.
    pub async fn discover(&self) -> std::io::Result<BTreeSet<String>> {
        Ok(self.snapshot().await?.into_keys().collect())
    }

    /// Like [`discover`](Self::discover), with modification times.
    pub async fn snapshot(&self) -> std::io::Result<Snapshot> {
        let mut found = Snapshot::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !self.pattern.matches(&name) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            found.insert(name, metadata.modified().ok());
        }
        Ok(found)
    }

    /// Finalize every loaded unit, then load everything discovered.
    ///
    /// Failures are logged per unit. A unit that fails to load is absent
    /// from the registry afterwards; the rest still load.
    pub async fn reload_all(&self) -> ReloadSummary {
        let _cycle = self.cycle.lock().await;
        let span = spans::cycle("reload", self.caps.network_name());
        async {
            let mut summary = ReloadSummary::default();
            let discovered = match self.discover().await {
                Ok(discovered) => discovered,
                Err(e) => {
                    error!(dir = %self.dir.display(), error = %e, "Failed to scan module directory");
                    return summary;
                }
            };

            let mut registry = self.registry.write().await;
            let mut old: Vec<(String, ModuleUnit)> = registry.drain().collect();
            old.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, unit) in old {
                finalize_unit(&id, &unit).await;
                summary.finalized += 1;
            }

            for id in discovered {
                match self.load_unit(&id).await {
                    Ok(unit) => {
                        info!(module = %id, kind = %unit.kind, "Loaded module");
                        registry.insert(id.clone(), unit);
                        summary.loaded.push(id);
                    }
                    Err(e) => {
                        error!(module = %id, code = e.error_code(), error = %e, "Failed to load module");
                        summary.failed.push(id);
                    }
                }
            }
            summary
        }
        .instrument(span)
        .await
    }

    /// Finalize and drop units whose files are gone. Others are untouched.
    ///
    /// Returns the removed ids.
    pub async fn retire_removed(&self) -> Vec<String> {
        let _cycle = self.cycle.lock().await;
        let span = spans::cycle("retire", self.caps.network_name());
        async {
            let discovered = match self.discover().await {
                Ok(discovered) => discovered,
                Err(e) => {
                    error!(dir = %self.dir.display(), error = %e, "Failed to scan module directory");
                    return Vec::new();
                }
            };

            let mut registry = self.registry.write().await;
            let mut removed: Vec<String> = registry
                .keys()
                .filter(|id| !discovered.contains(*id))
                .cloned()
                .collect();
            removed.sort();
            for id in &removed {
                if let Some(unit) = registry.remove(id) {
                    finalize_unit(id, &unit).await;
                    info!(module = %id, "Removed module");
                }
            }
            removed
        }
        .instrument(span)
        .await
    }

    /// Finalize every unit and leave the registry empty.
    pub async fn finalize_all(&self) {
        let _cycle = self.cycle.lock().await;
        let mut registry = self.registry.write().await;
        let mut old: Vec<(String, ModuleUnit)> = registry.drain().collect();
        old.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, unit) in old {
            finalize_unit(&id, &unit).await;
        }
    }

    /// Offer a message to every loaded unit the sender may invoke.
    ///
    /// Units are called in id order. A failing unit is logged and skipped;
    /// the effects of the others are still returned.
    pub async fn dispatch(&self, msg: &Incoming) -> Vec<Effect> {
        let network = self.caps.network();
        let caller = permissions::tier_of(&msg.sender, network);

        let mut units: Vec<(String, Arc<Instance>)> = self
            .registry
            .read()
            .await
            .iter()
            .map(|(id, unit)| (id.clone(), Arc::clone(&unit.instance)))
            .collect();
        units.sort_by(|a, b| a.0.cmp(&b.0));

        let mut effects = Vec::new();
        for (id, instance) in units {
            if !may_invoke(instance.module.access(), caller, network.minperms) {
                trace!(module = %id, caller, "Not permitted");
                continue;
            }

            let _shared = instance.gate.read().await;
            if instance.retired.load(Ordering::Acquire) {
                debug!(module = %id, "Skipping retired module");
                continue;
            }

            match guarded(instance.module.on_message(&self.caps, msg))
                .instrument(spans::module(&id))
                .await
            {
                Ok(mut produced) => effects.append(&mut produced),
                Err(e) => {
                    error!(module = %id, code = e.error_code(), error = %e, "Module failed to handle message");
                }
            }
        }
        effects
    }

    /// Loaded units, sorted by id.
    pub async fn loaded(&self) -> Vec<LoadedModule> {
        let mut loaded: Vec<LoadedModule> = self
            .registry
            .read()
            .await
            .iter()
            .map(|(id, unit)| LoadedModule {
                id: id.clone(),
                kind: unit.kind.clone(),
                loaded_at: unit.loaded_at,
            })
            .collect();
        loaded.sort_by(|a, b| a.id.cmp(&b.id));
        loaded
    }

    pub async fn is_loaded(&self, id: &str) -> bool {
        self.registry.read().await.contains_key(id)
    }

    async fn load_unit(&self, id: &str) -> Result<ModuleUnit, ModuleError> {
        let source = tokio::fs::read_to_string(self.dir.join(id)).await?;
        let default_kind = self.pattern.kind_of(id).unwrap_or(id);
        let settings = ModuleSettings::parse(id, default_kind, &source)?;

        let module = std::panic::catch_unwind(AssertUnwindSafe(|| self.catalog.create(&settings)))
            .unwrap_or(Err(ModuleError::Panicked))?;

        guarded(module.init(&self.caps))
            .instrument(spans::module(id))
            .await?;

        Ok(ModuleUnit {
            kind: settings.kind().to_string(),
            instance: Arc::new(Instance {
                module,
                gate: RwLock::new(()),
                retired: AtomicBool::new(false),
            }),
            loaded_at: Utc::now(),
        })
    }
}

/// Wait for in-flight handlers, mark retired, then run `finalize`.
async fn finalize_unit(id: &str, unit: &ModuleUnit) {
    let instance = &unit.instance;
    let _exclusive = instance.gate.write().await;
    if instance.retired.swap(true, Ordering::AcqRel) {
        return;
    }
    match guarded(instance.module.finalize())
        .instrument(spans::module(id))
        .await
    {
        Ok(()) => debug!(module = %id, "Finalized module"),
        Err(e) => error!(module = %id, code = e.error_code(), error = %e, "Module finalize failed"),
    }
}
