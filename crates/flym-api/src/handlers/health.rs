//! Health check handlers.

use std::future::Future;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use flym_core::result::AppResult;
use flym_core::traits::CacheProvider;

use crate::dto::response::{ApiResponse, ComponentHealth, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

async fn check_component(
    provider: &str,
    timeout: Duration,
    check: impl Future<Output = AppResult<bool>>,
) -> ComponentHealth {
    let healthy = match tokio::time::timeout(timeout, check).await {
        Ok(Ok(healthy)) => healthy,
        Ok(Err(e)) => {
            tracing::warn!(provider, error = %e, "Health check failed");
            false
        }
        Err(_) => {
            tracing::warn!(provider, "Health check timed out");
            false
        }
    };
    ComponentHealth {
        provider: provider.to_string(),
        healthy,
    }
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<DetailedHealthResponse>>) {
    let timeout = state.config.realtime.operation_timeout();
    let bus = state.realtime.bus();

    let (database, cache, bus) = tokio::join!(
        check_component(state.repo.backend_name(), timeout, state.repo.health_check()),
        check_component(state.cache.provider_name(), timeout, state.cache.health_check()),
        check_component(bus.provider_name(), timeout, bus.health_check()),
    );

    let healthy = database.healthy && cache.healthy && bus.healthy;
    let registry = &state.realtime.registry;
    let body = DetailedHealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        database,
        cache,
        bus,
        ws_connections: registry.connection_count(),
        online_users: registry.user_count(),
        active_rooms: registry.room_count(),
        metrics: state.realtime.metrics.snapshot(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ApiResponse::ok(body)))
}
