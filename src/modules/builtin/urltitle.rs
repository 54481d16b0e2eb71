//! Announces the title of links posted in channels.

use crate::error::ModuleError;
use crate::modules::{Capabilities, Effect, Incoming, Module, ModuleSettings};
use crate::permissions::{Access, PUBLIC};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

pub struct UrlTitle {
    /// Last URL seen per reply target.
    last_seen: Mutex<HashMap<String, String>>,
}

impl UrlTitle {
    pub fn from_settings(_settings: &ModuleSettings) -> Result<Box<dyn Module>, ModuleError> {
        Ok(Box::new(Self {
            last_seen: Mutex::new(HashMap::new()),
        }))
    }

    /// Records `url` for `target`. False if it repeats the previous one.
    fn is_new(&self, target: &str, url: &str) -> bool {
        let mut last_seen = self.last_seen.lock();
        if last_seen.get(target).is_some_and(|last| last == url) {
            return false;
        }
        last_seen.insert(target.to_string(), url.to_string());
        true
    }
}

#[async_trait]
impl Module for UrlTitle {
    fn kind(&self) -> &'static str {
        "urltitle"
    }

    fn access(&self) -> Access {
        Access::Tier(PUBLIC)
    }

    async fn init(&self, caps: &Capabilities) -> Result<(), ModuleError> {
        debug!(enabled = caps.urltitles_enabled(), "URL titles ready");
        Ok(())
    }

    async fn finalize(&self) -> Result<(), ModuleError> {
        self.last_seen.lock().clear();
        Ok(())
    }

    async fn on_message(
        &self,
        caps: &Capabilities,
        msg: &Incoming,
    ) -> Result<Vec<Effect>, ModuleError> {
        if !caps.urltitles_enabled() {
            return Ok(Vec::new());
        }
        let Some(url) = caps.extract_url(&msg.text) else {
            return Ok(Vec::new());
        };
        if !self.is_new(&msg.reply_to, url) {
            debug!(url = %url, "Repeated URL ignored");
            return Ok(Vec::new());
        }

        Ok(caps
            .title_of(url)
            .await
            .map(|title| Effect::say(&msg.reply_to, title))
            .into_iter()
            .collect())
    }
}
