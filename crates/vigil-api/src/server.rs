//! API server wiring and the background maintenance loop.

use std::sync::Arc;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use vigil_engine::TriageEngine;

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::routes::create_router;
use crate::state::ApiState;

/// HTTP server for the triage engine.
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Creates a server around an engine.
    #[must_use]
    pub fn new(config: ServerConfig, engine: Arc<TriageEngine>) -> Self {
        let state = Arc::new(ApiState::new(config, engine));
        Self { state }
    }

    /// The shared state, for embedding or tests.
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Create the router without starting the server.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }

    /// Spawns the periodic maintenance loop: escalation, snooze, and
    /// lease sweeps plus missing-data checks, every sweep interval.
    ///
    /// The handle runs until aborted.
    #[must_use]
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let interval = state.config().sweep_interval;
        let budget = state.config().sweep_budget;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh
            // server does not sweep before anything is loaded.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let now = Utc::now();
                let engine = state.engine();

                let escalations = engine.run_escalation_sweep(now, Some(budget));
                let snoozes = engine.run_snooze_sweep(now, Some(budget));
                let leases = engine.run_lease_sweep(now, Some(budget));
                let missing = engine.check_missing_data(now);

                debug!(
                    escalated = escalations.escalated,
                    snoozes_cleared = snoozes.snoozes_cleared,
                    leases_reclaimed = leases.leases_reclaimed,
                    missing_data_alerts = missing.alerts_created.len(),
                    "maintenance sweep complete"
                );
            }
        })
    }

    /// Binds and serves until the shutdown future completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> ApiResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::BindFailed(addr, e))?;

        info!(addr = %addr, "API server listening");

        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
