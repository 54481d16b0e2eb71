//! Hot-reloadable command modules.
//!
//! A module is enabled by a file in the module directory whose name matches
//! the configured pattern (`module_<kind>.toml` by default). The file's TOML
//! content is the module's settings. Each load builds a fresh instance from
//! the [`ModuleCatalog`], so no state is shared between units or carried
//! across reloads.
//!
//! Modules see the rest of the bot only through [`Capabilities`] and answer
//! with [`Effect`]s, which the supervisor applies to the live connection.

pub mod builtin;
pub mod catalog;
pub mod runtime;
pub mod watcher;

pub use catalog::{ModuleCatalog, ModuleFactory};
pub use runtime::{LoadedModule, ModulePattern, ModuleRuntime, ReloadSummary};
pub use watcher::spawn_watcher;

use crate::config::NetworkConfig;
use crate::error::ModuleError;
use crate::fetch::{Document, FetchResponse, Fetcher};
use crate::permissions::{self, Access, PUBLIC, Tier};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;

/// Trait for bot modules.
///
/// `init` and `finalize` are optional lifecycle hooks. `finalize` runs on the
/// old instance before a reload builds its replacement.
#[async_trait]
pub trait Module: Send + Sync {
    /// Catalog name of the module (e.g., "urltitle").
    fn kind(&self) -> &'static str;

    /// Access required to invoke this module.
    fn access(&self) -> Access {
        Access::Tier(PUBLIC)
    }

    async fn init(&self, _caps: &Capabilities) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn finalize(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Handle a chat message.
    ///
    /// # Returns
    /// A list of effects to apply.
    async fn on_message(
        &self,
        caps: &Capabilities,
        msg: &Incoming,
    ) -> Result<Vec<Effect>, ModuleError>;
}

/// Actions a module asks the supervisor to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a PRIVMSG.
    Say { target: String, text: String },
    Join(String),
    Part(String),
    /// Finalize and reload every module of this network.
    ReloadModules,
    /// Reply to `target` with the loaded module list.
    ListModules { target: String },
    /// Leave the network and stop reconnecting.
    Quit(Option<String>),
}

impl Effect {
    pub fn say(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Say {
            target: target.into(),
            text: text.into(),
        }
    }
}

/// A PRIVMSG received on a network.
#[derive(Debug, Clone)]
pub struct Incoming {
    /// Sender identity, `nick!user@host`.
    pub sender: String,
    /// Channel or our own nick.
    pub target: String,
    pub text: String,
    /// Where replies go: the channel, or the sender's nick for private messages.
    pub reply_to: String,
}

impl Incoming {
    pub fn new(
        sender: impl Into<String>,
        target: impl Into<String>,
        text: impl Into<String>,
        own_nick: &str,
    ) -> Self {
        let sender = sender.into();
        let target = target.into();
        let reply_to = if target.eq_ignore_ascii_case(own_nick) {
            permissions::nick_of(&sender).to_string()
        } else {
            target.clone()
        };
        Self {
            sender,
            target,
            text: text.into(),
            reply_to,
        }
    }

    pub fn nick(&self) -> &str {
        permissions::nick_of(&self.sender)
    }

    pub fn is_private(&self) -> bool {
        self.reply_to != self.target
    }

    /// Parses `<trigger><name> <args>` commands such as `.join #chan`.
    pub fn command(&self, trigger: &str) -> Option<Command<'_>> {
        let rest = self.text.strip_prefix(trigger)?;
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Command { name, args })
    }
}

/// A triggered command split from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

/// Settings parsed from a module file.
#[derive(Debug, Clone, Default)]
pub struct ModuleSettings {
    id: String,
    kind: String,
    table: toml::Table,
}

impl ModuleSettings {
    /// Parse module file content.
    ///
    /// A top-level `kind` key selects the catalog entry; otherwise
    /// `default_kind` (derived from the file name) is used.
    pub fn parse(id: &str, default_kind: &str, source: &str) -> Result<Self, ModuleError> {
        let table: toml::Table = toml::from_str(source)?;
        let kind = match table.get("kind") {
            None => default_kind.to_string(),
            Some(toml::Value::String(kind)) => kind.clone(),
            Some(_) => {
                return Err(ModuleError::Setting {
                    key: "kind".to_string(),
                    reason: "expected a string".to_string(),
                });
            }
        };
        Ok(Self {
            id: id.to_string(),
            kind,
            table,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// String setting with a default. A value of another type is an error.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ModuleError> {
        match self.table.get(key) {
            None => Ok(default),
            Some(toml::Value::String(value)) => Ok(value),
            Some(_) => Err(ModuleError::Setting {
                key: key.to_string(),
                reason: "expected a string".to_string(),
            }),
        }
    }

    /// Command prefix, `.` unless the file sets `trigger`.
    pub fn trigger(&self) -> Result<&str, ModuleError> {
        let trigger = self.str_or("trigger", ".")?;
        if trigger.is_empty() {
            return Err(ModuleError::Setting {
                key: "trigger".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(trigger)
    }
}

/// The fixed set of utilities exposed to module code.
///
/// This is the only way a module reaches network state. It carries no
/// reference to the supervisor, the client table, or the module registry.
#[derive(Clone)]
pub struct Capabilities {
    network: Arc<NetworkConfig>,
    fetcher: Fetcher,
}

impl Capabilities {
    pub fn new(network: Arc<NetworkConfig>, fetcher: Fetcher) -> Self {
        Self { network, fetcher }
    }

    pub(crate) fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn network_name(&self) -> &str {
        &self.network.name
    }

    pub fn urltitles_enabled(&self) -> bool {
        self.network.urltitles_enabled
    }

    pub fn nick_of<'a>(&self, identity: &'a str) -> &'a str {
        permissions::nick_of(identity)
    }

    pub fn tier_of(&self, identity: &str) -> Tier {
        permissions::tier_of(identity, &self.network)
    }

    pub fn to_display_text<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        crate::text::to_display_text(bytes)
    }

    pub fn to_utf8(&self, text: &str) -> Vec<u8> {
        crate::text::to_utf8(text)
    }

    pub fn extract_url<'a>(&self, text: &'a str) -> Option<&'a str> {
        crate::fetch::extract_url(text)
    }

    pub async fn fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Option<FetchResponse> {
        self.fetcher.fetch(url, params, headers).await
    }

    pub async fn fetch_document(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Option<Document> {
        self.fetcher.fetch_document(url, params, headers).await
    }

    pub async fn title_of(&self, url: &str) -> Option<String> {
        self.fetcher.title_of(url).await
    }
}
