//! API server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// How often the maintenance loop runs escalation, snooze, lease,
    /// and missing-data sweeps.
    pub sweep_interval: Duration,
    /// Per-sweep time budget; a sweep past the budget stops and picks
    /// up remaining work on the next tick.
    pub sweep_budget: Duration,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sweep_interval: Duration::from_secs(60),
            sweep_budget: Duration::from_secs(10),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the maintenance sweep interval.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the per-sweep time budget.
    #[must_use]
    pub const fn with_sweep_budget(mut self, budget: Duration) -> Self {
        self.sweep_budget = budget;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn builder_overrides() {
        let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 9999)))
            .with_sweep_interval(Duration::from_secs(5))
            .with_cors_origin("http://localhost:3000");
        assert_eq!(config.bind_addr.port(), 9999);
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.cors_origins.len(), 1);
    }
}
