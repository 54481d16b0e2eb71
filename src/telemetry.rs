//! Telemetry utilities: subscriber setup and span constructors.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `verbosity` picks the level:
/// negative is quiet (warnings only), 0 is info, 1 is debug, 2+ is trace.
pub fn init(verbosity: i8) {
    let fallback = match verbosity {
        i8::MIN..=-1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for everything a network supervisor does.
    pub fn network(name: &str) -> Span {
        info_span!("network", name = %name)
    }

    /// Span for a single module call.
    pub fn module(id: &str) -> Span {
        info_span!("module", id = %id)
    }

    /// Span for a module lifecycle cycle (reload or retire).
    pub fn cycle(kind: &'static str, network: &str) -> Span {
        info_span!("modules", cycle = kind, network = %network)
    }
}
