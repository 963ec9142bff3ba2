//! # flym-api
//!
//! HTTP API layer for Flym chat built on Axum.
//!
//! Provides the session and invite endpoints, health checks, the WebSocket
//! upgrade, middleware (CORS, logging), extractors, DTOs, and error
//! mapping.

pub mod app;
pub mod cookies;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
