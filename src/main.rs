//! Flym Server: realtime chat backend
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::{EnvFilter, fmt};

use flym_api::AppState;
use flym_auth::{
    InviteCodec, InviteService, JwtDecoder, JwtEncoder, LoginService, RevocationStore, SessionManager,
};
use flym_cache::CacheManager;
use flym_core::config::AppConfig;
use flym_core::error::AppError;
use flym_realtime::RealtimeEngine;
use flym_worker::{CronScheduler, GuestCleanupJob};

#[tokio::main]
async fn main() {
    let env = std::env::var("FLYM_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Flym v{}", env!("CARGO_PKG_VERSION"));
    let started_at = Instant::now();

    // ── Step 1: Persistence ──────────────────────────────────────
    tracing::info!(provider = %config.database.provider, "Connecting chat repository...");
    let repo = flym_database::repositories::connect_repository(&config.database).await?;

    // ── Step 2: Cache (revocation tombstones) ────────────────────
    tracing::info!(provider = %config.cache.provider, "Initializing cache...");
    let cache = Arc::new(CacheManager::new(&config.cache).await?);

    // ── Step 3: Pub/sub bus ──────────────────────────────────────
    tracing::info!(provider = %config.bus.provider, "Connecting message bus...");
    let bus = flym_realtime::bridge::connect_bus(&config.bus).await?;

    // ── Step 4: Auth ─────────────────────────────────────────────
    let encoder = JwtEncoder::new(&config.auth)?;
    let decoder = JwtDecoder::new(&config.auth)?;
    let revocation = Arc::new(RevocationStore::new(Arc::clone(&cache)));
    let sessions = Arc::new(SessionManager::new(
        Arc::new(encoder.clone()),
        Arc::new(decoder.clone()),
        revocation,
        config.auth.clone(),
    ));

    let logins = Arc::new(LoginService::new(Arc::clone(&repo), Arc::clone(&sessions)));

    // ── Step 5: Realtime engine ──────────────────────────────────
    let realtime = RealtimeEngine::new(
        &config.realtime,
        &config.bus,
        bus,
        Arc::clone(&repo),
        Arc::clone(&sessions),
    );
    realtime.start().await?;

    let invites = Arc::new(InviteService::new(
        InviteCodec::new(encoder, decoder, config.auth.invite_ttl()),
        Arc::clone(&repo),
        Arc::clone(&sessions),
        realtime.event_publisher(),
        config.auth.guest_ttl(),
    ));

    // ── Step 6: Scheduled maintenance ────────────────────────────
    let scheduler = if config.worker.enabled {
        let scheduler = CronScheduler::new(config.worker.clone()).await?;
        let job = Arc::new(GuestCleanupJob::new(
            Arc::clone(&repo),
            realtime.event_publisher(),
        ));
        scheduler.register_guest_cleanup(job).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 7: HTTP server ──────────────────────────────────────
    let app_state = AppState {
        config: Arc::new(config.clone()),
        repo,
        cache,
        sessions,
        logins,
        invites,
        realtime: realtime.clone(),
        started_at,
    };
    let app = flym_api::build_app(app_state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Flym server listening on {}", addr);

    // ── Step 8: Graceful shutdown ────────────────────────────────
    let shutdown_engine = realtime.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            // Open sockets would otherwise hold the server open.
            shutdown_engine.shutdown();
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
    }

    tracing::info!("Flym server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
