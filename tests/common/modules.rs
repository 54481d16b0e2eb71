//! Modules that record their lifecycle into a shared log.

use async_trait::async_trait;
use demibot::error::ModuleError;
use demibot::modules::{Capabilities, Effect, Incoming, Module, ModuleCatalog, ModuleSettings};
use demibot::permissions::Access;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How long a `slow` reply is held back.
pub const SLOW_REPLY: Duration = Duration::from_millis(300);

/// Lifecycle events as `"<event> <id>#<generation>"`.
pub type Log = Arc<Mutex<Vec<String>>>;

/// Echoes `<id>: <text>` and logs init, finalize, and each message.
///
/// The `panic` setting makes it panic on messages equal to that value.
/// The `slow` setting delays the reply to messages equal to that value.
pub struct Recorder {
    id: String,
    generation: usize,
    panic_on: Option<String>,
    slow_on: Option<String>,
    log: Log,
}

impl Recorder {
    fn tag(&self) -> String {
        format!("{}#{}", self.id, self.generation)
    }

    fn record(&self, event: &str) {
        let entry = format!("{event} {}", self.tag());
        self.log.lock().push(entry);
    }
}

#[async_trait]
impl Module for Recorder {
    fn kind(&self) -> &'static str {
        "recorder"
    }

    fn access(&self) -> Access {
        Access::Public
    }

    async fn init(&self, _caps: &Capabilities) -> Result<(), ModuleError> {
        self.record("init");
        Ok(())
    }

    async fn finalize(&self) -> Result<(), ModuleError> {
        self.record("finalize");
        Ok(())
    }

    async fn on_message(
        &self,
        _caps: &Capabilities,
        msg: &Incoming,
    ) -> Result<Vec<Effect>, ModuleError> {
        if self.panic_on.as_deref() == Some(msg.text.as_str()) {
            panic!("recorder asked to panic");
        }
        if self.slow_on.as_deref() == Some(msg.text.as_str()) {
            tokio::time::sleep(SLOW_REPLY).await;
        }
        if msg.text == "fail" {
            return Err(ModuleError::Handler("asked to fail".to_string()));
        }
        self.record("message");
        Ok(vec![Effect::say(
            &msg.reply_to,
            format!("{}: {}", self.id, msg.text),
        )])
    }
}

/// A catalog mapping each of `kinds` to a [`Recorder`] writing to `log`.
#[allow(dead_code)]
pub fn recording_catalog(kinds: &[&str], log: &Log) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::builtin();
    let generation = Arc::new(AtomicUsize::new(0));
    for kind in kinds {
        let log = Arc::clone(log);
        let generation = Arc::clone(&generation);
        catalog.register(kind, move |settings: &ModuleSettings| {
            let panic_on = settings.str_or("panic", "")?;
            let slow_on = settings.str_or("slow", "")?;
            Ok(Box::new(Recorder {
                id: settings.id().to_string(),
                generation: generation.fetch_add(1, Ordering::SeqCst) + 1,
                panic_on: (!panic_on.is_empty()).then(|| panic_on.to_string()),
                slow_on: (!slow_on.is_empty()).then(|| slow_on.to_string()),
                log: Arc::clone(&log),
            }) as Box<dyn Module>)
        });
    }
    catalog
}

/// Entries of `log` mentioning `id`, in order.
#[allow(dead_code)]
pub fn events_for(log: &Log, id: &str) -> Vec<String> {
    log.lock()
        .iter()
        .filter(|entry| entry.contains(id))
        .cloned()
        .collect()
}
