//! Operator commands: module reload and listing, channel membership, quit.

use crate::error::ModuleError;
use crate::modules::{Capabilities, Effect, Incoming, Module, ModuleSettings};
use crate::permissions::{ADMIN, Access, SUPERADMIN};
use async_trait::async_trait;
use tracing::info;

pub struct Admin {
    trigger: String,
}

impl Admin {
    pub fn from_settings(settings: &ModuleSettings) -> Result<Box<dyn Module>, ModuleError> {
        Ok(Box::new(Self {
            trigger: settings.trigger()?.to_string(),
        }))
    }
}

fn is_channel(name: &str) -> bool {
    name.starts_with(['#', '&', '+', '!'])
}

#[async_trait]
impl Module for Admin {
    fn kind(&self) -> &'static str {
        "admin"
    }

    fn access(&self) -> Access {
        Access::Tier(ADMIN)
    }

    async fn on_message(
        &self,
        caps: &Capabilities,
        msg: &Incoming,
    ) -> Result<Vec<Effect>, ModuleError> {
        let Some(command) = msg.command(&self.trigger) else {
            return Ok(Vec::new());
        };
        let reply_to = msg.reply_to.as_str();
        let first_arg = command.args.split_whitespace().next();

        let effects = match command.name {
            "reload" => {
                info!(by = %msg.nick(), "Module reload requested");
                vec![
                    Effect::say(reply_to, "Reloading modules."),
                    Effect::ReloadModules,
                ]
            }
            "modules" => vec![Effect::ListModules {
                target: reply_to.to_string(),
            }],
            "join" => match first_arg {
                Some(channel) if is_channel(channel) => vec![Effect::Join(channel.to_string())],
                _ => vec![Effect::say(reply_to, "Usage: join <#channel>")],
            },
            "part" => match first_arg.or((!msg.is_private()).then_some(reply_to)) {
                Some(channel) if is_channel(channel) => vec![Effect::Part(channel.to_string())],
                _ => vec![Effect::say(reply_to, "Usage: part <#channel>")],
            },
            "quit" => {
                if caps.tier_of(&msg.sender) < SUPERADMIN {
                    vec![Effect::say(reply_to, "Permission denied.")]
                } else {
                    info!(by = %msg.nick(), "Quit requested");
                    let message = (!command.args.is_empty()).then(|| command.args.to_string());
                    vec![Effect::Quit(message)]
                }
            }
            _ => Vec::new(),
        };
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_prefixes() {
        assert!(is_channel("#rust"));
        assert!(is_channel("&local"));
        assert!(!is_channel("alice"));
        assert!(!is_channel(""));
    }
}
