use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle used to swap the active log filter at runtime.
pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Initialize tracing from configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn install_tracing_from_config(cfg: &jobcast_config::LoggingConfig) -> ReloadHandle {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let (filter, handle) = reload::Layer::new(EnvFilter::new(directives));
    let registry = tracing_subscriber::registry().with(filter);

    if cfg.json {
        registry
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .init();
    } else {
        registry
            .with(fmt::layer().with_timer(ChronoUtc::rfc_3339()))
            .init();
    }

    handle
}

/// Apply a new level from configuration unless `RUST_LOG` pins it.
pub fn reload_level(handle: &ReloadHandle, level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    match handle.reload(EnvFilter::new(level)) {
        Ok(()) => tracing::info!(%level, "log level reloaded"),
        Err(error) => tracing::warn!(%error, "failed to reload log level"),
    }
}
