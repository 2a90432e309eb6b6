use jobcast_config::JobsConfig;
use jobcast_jobs::{JobRegistry, SessionHub};

/// Shared application state passed to every route handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: JobRegistry,
    pub hub: SessionHub,
    pub jobs: JobsConfig,
}

impl AppState {
    pub fn new(registry: JobRegistry, hub: SessionHub, jobs: JobsConfig) -> Self {
        Self {
            registry,
            hub,
            jobs,
        }
    }
}
