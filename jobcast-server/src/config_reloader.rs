use std::time::Duration;

use crate::tracing_setup::{reload_level, ReloadHandle};

const RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the background task that re-reads the config file and applies
/// log level changes. Other settings take effect on restart.
pub fn spawn_config_reloader(config_path: String, initial_level: String, handle: ReloadHandle) {
    tokio::spawn(async move {
        let mut current = initial_level;
        let mut interval = tokio::time::interval(RELOAD_INTERVAL);
        interval.tick().await;

        loop {
            interval.tick().await;

            let cfg = match jobcast_config::load_config(Some(&config_path)) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!(%e, "failed to reload config file");
                    continue;
                }
            };
            if let Err(e) = jobcast_config::validate_config(&cfg) {
                tracing::error!(%e, "reloaded config failed validation, ignoring");
                continue;
            }

            if cfg.logging.level != current {
                reload_level(&handle, &cfg.logging.level);
                current = cfg.logging.level;
            }
        }
    });
}
