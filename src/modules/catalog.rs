//! Statically registered module factories.

use super::{Module, ModuleSettings, builtin};
use crate::error::ModuleError;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a fresh module instance from its settings.
pub type ModuleFactory =
    Arc<dyn Fn(&ModuleSettings) -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

/// Maps module kinds to factories.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the modules shipped with the bot.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("ping", builtin::Ping::from_settings);
        catalog.register("urltitle", builtin::UrlTitle::from_settings);
        catalog.register("admin", builtin::Admin::from_settings);
        catalog
    }

    /// Register a factory, replacing any previous one for `kind`.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&ModuleSettings) -> Result<Box<dyn Module>, ModuleError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Sorted list of registered kinds.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build a new instance for the kind named in `settings`.
    pub fn create(&self, settings: &ModuleSettings) -> Result<Box<dyn Module>, ModuleError> {
        let factory = self
            .factories
            .get(settings.kind())
            .ok_or_else(|| ModuleError::UnknownKind(settings.kind().to_string()))?;
        factory(settings)
    }
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}
