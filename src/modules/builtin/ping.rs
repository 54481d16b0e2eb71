//! Liveness and version replies.

use crate::error::ModuleError;
use crate::modules::{Capabilities, Effect, Incoming, Module, ModuleSettings};
use crate::permissions::Access;
use async_trait::async_trait;

const PROJECT_URL: &str = "https://github.com/mikar/demibot";

pub struct Ping {
    trigger: String,
}

impl Ping {
    pub fn from_settings(settings: &ModuleSettings) -> Result<Box<dyn Module>, ModuleError> {
        Ok(Box::new(Self {
            trigger: settings.trigger()?.to_string(),
        }))
    }
}

#[async_trait]
impl Module for Ping {
    fn kind(&self) -> &'static str {
        "ping"
    }

    fn access(&self) -> Access {
        Access::Public
    }

    async fn on_message(
        &self,
        _caps: &Capabilities,
        msg: &Incoming,
    ) -> Result<Vec<Effect>, ModuleError> {
        let Some(command) = msg.command(&self.trigger) else {
            return Ok(Vec::new());
        };
        let reply = match command.name {
            "ping" => "pong".to_string(),
            "version" => format!("demibot {} - {}", env!("CARGO_PKG_VERSION"), PROJECT_URL),
            _ => return Ok(Vec::new()),
        };
        Ok(vec![Effect::say(&msg.reply_to, reply)])
    }
}
