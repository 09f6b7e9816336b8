//! vigil - clinical alert triage server.
//!
//! Serves the triage API and runs the background maintenance loop
//! (escalation, snooze, and lease sweeps plus missing-data checks).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil_api::{ApiServer, ServerConfig};
use vigil_core::TriagePolicy;
use vigil_engine::TriageEngine;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Clinical alert lifecycle and triage engine")]
#[command(version)]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "VIGIL_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Maintenance sweep interval in seconds.
    #[arg(long, env = "VIGIL_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Per-sweep time budget in seconds.
    #[arg(long, env = "VIGIL_SWEEP_BUDGET_SECS", default_value_t = 10)]
    sweep_budget_secs: u64,

    /// CORS allowed origin. May be given multiple times; none allows
    /// every origin.
    #[arg(long = "cors-origin", env = "VIGIL_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::new(cli.bind_addr)
        .with_sweep_interval(Duration::from_secs(cli.sweep_interval_secs))
        .with_sweep_budget(Duration::from_secs(cli.sweep_budget_secs));
    for origin in cli.cors_origins {
        config = config.with_cors_origin(origin);
    }

    let engine = Arc::new(TriageEngine::in_memory(TriagePolicy::default()));
    let server = ApiServer::new(config, engine);

    let maintenance = server.spawn_maintenance();

    info!("starting vigil");
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    maintenance.abort();
    Ok(())
}
