//! Tracing setup for hosts embedding the workflow.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! `logging.level`, and can be swapped at runtime.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber at `logging.level`, or moves one installed
/// earlier to that level. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    if LOG_RELOAD_HANDLE.get().is_none() {
        init_tracing_with_level(&logging.level);
    } else if std::env::var_os("RUST_LOG").is_none() {
        apply_logging_level(&logging.level);
    }
}

/// Installs the global subscriber. Later calls keep the first subscriber.
pub fn init_tracing_with_level(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Swaps the log level of an installed subscriber. Returns false when
/// tracing was never initialised here.
pub fn apply_logging_level(level: &str) -> bool {
    LOG_RELOAD_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|f| *f = EnvFilter::new(level)).is_ok())
}
