//! Tracing setup for the engine and the example runner.
//!
//! The library itself only emits `tracing` events. Installing a subscriber is
//! left to the host, and `init_logging` is the ready-made choice.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber built from `config`.
///
/// `RUST_LOG` overrides `config.level`. Returns false when a global
/// subscriber was already installed; the existing one is kept.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.with_target(true).compact().try_init()
    };
    installed.is_ok()
}
