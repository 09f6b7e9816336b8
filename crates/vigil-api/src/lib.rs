//! HTTP API for the Vigil triage engine.
//!
//! Exposes alert lifecycle, triage queue, rule management, and
//! observation ingestion endpoints over axum, with the caller's
//! identity supplied by upstream authentication headers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::Caller;
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::ApiServer;
pub use state::ApiState;
