//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload and remote URL submission endpoints
//! - Job polling and cancellation
//! - Liveness and readiness checks
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
