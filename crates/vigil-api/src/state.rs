//! Shared state for API handlers.

use std::sync::Arc;
use std::time::Instant;

use vigil_engine::TriageEngine;

use crate::config::ServerConfig;

/// State shared across the router.
pub struct ApiState {
    engine: Arc<TriageEngine>,
    config: ServerConfig,
    started_at: Instant,
}

impl ApiState {
    /// Creates the shared state.
    #[must_use]
    pub fn new(config: ServerConfig, engine: Arc<TriageEngine>) -> Self {
        Self {
            engine,
            config,
            started_at: Instant::now(),
        }
    }

    /// The triage engine.
    #[must_use]
    pub fn engine(&self) -> &TriageEngine {
        &self.engine
    }

    /// The server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Seconds since the server started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
