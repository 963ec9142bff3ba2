//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use flym_auth::SessionManager;
use flym_core::config::{BusConfig, RealtimeConfig};
use flym_core::result::AppResult;
use flym_core::traits::EventPublisher;
use flym_database::ChatRepository;

use crate::bridge::{ChannelNames, MessageBus, PubSubBridge};
use crate::channel::RoomRegistry;
use crate::connection::{ConnectionManager, HeartbeatMonitor, SocketAuthenticator};
use crate::metrics::RealtimeMetrics;
use crate::notification::NotificationDispatcher;

/// Central real-time engine that coordinates all WebSocket subsystems.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Connection manager.
    pub connections: Arc<ConnectionManager>,
    /// Upgrade authentication.
    pub authenticator: Arc<SocketAuthenticator>,
    /// Local room and user registry.
    pub registry: Arc<RoomRegistry>,
    /// Bus fan-out.
    pub bridge: Arc<PubSubBridge>,
    /// Notification dispatcher.
    pub notifications: Arc<NotificationDispatcher>,
    /// Heartbeat monitor.
    pub heartbeat: Arc<HeartbeatMonitor>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
    bus: Arc<dyn MessageBus>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("bus", &self.bus.provider_name())
            .finish_non_exhaustive()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine with all subsystems. Nothing runs
    /// until [`start`](Self::start).
    pub fn new(
        config: &RealtimeConfig,
        bus_config: &BusConfig,
        bus: Arc<dyn MessageBus>,
        repo: Arc<dyn ChatRepository>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let names = ChannelNames::new(bus_config.channel_prefix.clone());

        let metrics = Arc::new(RealtimeMetrics::new());
        let registry = Arc::new(RoomRegistry::new());
        let bridge = Arc::new(PubSubBridge::new(
            bus.clone(),
            registry.clone(),
            names,
            metrics.clone(),
            config.operation_timeout(),
            shutdown.clone(),
        ));
        let connections = Arc::new(ConnectionManager::new(
            config.clone(),
            registry.clone(),
            bridge.clone(),
            repo,
            metrics.clone(),
        ));
        let notifications = Arc::new(NotificationDispatcher::new(bridge.clone(), shutdown.clone()));
        let heartbeat = Arc::new(HeartbeatMonitor::new(
            connections.clone(),
            metrics.clone(),
            config.heartbeat_interval(),
        ));
        let authenticator = Arc::new(SocketAuthenticator::new(sessions, config.operation_timeout()));

        info!(bus = bus.provider_name(), "Real-time engine initialized");

        Self {
            connections,
            authenticator,
            registry,
            bridge,
            notifications,
            heartbeat,
            metrics,
            bus,
            shutdown,
        }
    }

    /// Subscribe the notification and system channels and start the
    /// heartbeat.
    pub async fn start(&self) -> AppResult<()> {
        self.bridge.start_notification_consumer().await?;
        self.notifications.start().await?;
        tokio::spawn(self.heartbeat.clone().run(self.shutdown.child_token()));
        info!("Real-time engine started");
        Ok(())
    }

    /// Publisher for system events raised on this process. Events are
    /// routed to the sockets they concern, then written to the system
    /// channel.
    pub fn event_publisher(&self) -> Arc<dyn EventPublisher> {
        self.notifications.clone()
    }

    /// The bus, for health checks.
    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    /// Token cancelled when the engine shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop background tasks and close every connection.
    pub fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.shutdown.cancel();
        self.connections.close_all();
        info!("Real-time engine shut down");
    }
}
