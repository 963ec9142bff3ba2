//! Room and user fan-out over the bus.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use flym_core::error::AppError;
use flym_core::result::AppResult;

use crate::channel::RoomRegistry;
use crate::connection::handle::ConnectionHandle;
use crate::message::types::ServerMessage;
use crate::metrics::RealtimeMetrics;

use super::bus::{BusSubscription, MessageBus};
use super::envelope::{BusEnvelope, ChannelNames};

/// Publishes local events to the bus and delivers bus traffic to local
/// connections.
///
/// A process holds one bus subscription per room with local members plus
/// one for direct notifications. Every message reaches local sockets
/// through the bus, including those published by this process, so all
/// members of a room see one order.
#[derive(Debug)]
pub struct PubSubBridge {
    bus: Arc<dyn MessageBus>,
    registry: Arc<RoomRegistry>,
    names: ChannelNames,
    metrics: Arc<RealtimeMetrics>,
    timeout: Duration,
    /// Room ID → token stopping that room's consumer task.
    room_tasks: DashMap<Uuid, CancellationToken>,
    shutdown: CancellationToken,
}

impl PubSubBridge {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<RoomRegistry>,
        names: ChannelNames,
        metrics: Arc<RealtimeMetrics>,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            bus,
            registry,
            names,
            metrics,
            timeout,
            room_tasks: DashMap::new(),
            shutdown,
        }
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    /// Publish a chat message to every process with members in the room.
    pub async fn publish_to_room(&self, room_id: Uuid, payload: ServerMessage) -> AppResult<()> {
        let channel = self.names.room(room_id);
        self.publish(&channel, &BusEnvelope::ChatMessage { room_id, payload })
            .await
    }

    /// Publish a room-scoped system event.
    pub async fn publish_room_system(&self, room_id: Uuid, payload: ServerMessage) -> AppResult<()> {
        let channel = self.names.room(room_id);
        self.publish(&channel, &BusEnvelope::System { room_id, payload })
            .await
    }

    /// Publish a direct notification for every connection of a user.
    pub async fn publish_to_user(&self, user_id: Uuid, payload: ServerMessage) -> AppResult<()> {
        let channel = self.names.notify();
        self.publish(&channel, &BusEnvelope::DirectNotification { user_id, payload })
            .await
    }

    async fn publish(&self, channel: &str, envelope: &BusEnvelope) -> AppResult<()> {
        let json = serde_json::to_string(envelope)?;
        let result = match tokio::time::timeout(self.timeout, self.bus.publish(channel, json)).await {
            Ok(result) => result,
            Err(elapsed) => Err(AppError::from(elapsed)),
        };
        if let Err(e) = &result {
            self.metrics.inc_bus_failure();
            warn!(%channel, error = %e, "Bus publish failed");
        }
        result
    }

    /// Deliver to local members of a room. Returns the number of frames
    /// queued.
    pub fn deliver_to_room(&self, room_id: Uuid, msg: &ServerMessage) -> usize {
        self.deliver(self.registry.room_members(room_id), msg)
    }

    /// Deliver to every local connection of a user.
    pub fn deliver_to_user(&self, user_id: Uuid, msg: &ServerMessage) -> usize {
        self.deliver(self.registry.user_connections(user_id), msg)
    }

    fn deliver(&self, targets: Vec<Arc<ConnectionHandle>>, msg: &ServerMessage) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Dropping undeliverable message");
                return 0;
            }
        };
        let sent = targets
            .iter()
            .filter(|conn| conn.is_open())
            .filter(|conn| conn.send_text(json.clone()))
            .count();
        self.metrics.add_sent(sent as u64);
        sent
    }

    /// Route one raw bus payload to local connections.
    pub fn dispatch(&self, raw: &str) -> usize {
        match serde_json::from_str::<BusEnvelope>(raw) {
            Ok(BusEnvelope::ChatMessage { room_id, payload })
            | Ok(BusEnvelope::System { room_id, payload }) => {
                self.deliver_to_room(room_id, &payload)
            }
            Ok(BusEnvelope::DirectNotification { user_id, payload }) => {
                self.deliver_to_user(user_id, &payload)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed bus envelope");
                0
            }
        }
    }

    /// Subscribe this process to a room's channel unless already
    /// subscribed. Completes only once the subscription is live.
    pub async fn ensure_room_subscription(self: &Arc<Self>, room_id: Uuid) -> AppResult<()> {
        if self.room_tasks.contains_key(&room_id) {
            return Ok(());
        }

        let channel = self.names.room(room_id);
        let subscription =
            tokio::time::timeout(self.timeout, self.bus.subscribe(&channel)).await??;
        let token = self.shutdown.child_token();

        match self.room_tasks.entry(room_id) {
            // a concurrent join subscribed first; our receiver is dropped
            Entry::Occupied(_) => return Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        debug!(%room_id, "Room subscription started");
        self.spawn_consumer(subscription, token, Some(room_id));
        Ok(())
    }

    /// Stop the room's consumer if the room has no local members.
    pub fn release_room_subscription(&self, room_id: Uuid) {
        let registry = &self.registry;
        if let Some((_, token)) = self
            .room_tasks
            .remove_if(&room_id, |_, _| registry.room_size(room_id) == 0)
        {
            token.cancel();
            debug!(%room_id, "Room subscription released");
        }
    }

    /// Number of rooms this process is subscribed to.
    pub fn subscribed_rooms(&self) -> usize {
        self.room_tasks.len()
    }

    pub fn is_subscribed(&self, room_id: Uuid) -> bool {
        self.room_tasks.contains_key(&room_id)
    }

    /// Subscribe the direct-notification channel.
    pub async fn start_notification_consumer(self: &Arc<Self>) -> AppResult<()> {
        let subscription = self.bus.subscribe(&self.names.notify()).await?;
        self.spawn_consumer(subscription, self.shutdown.child_token(), None);
        Ok(())
    }

    fn spawn_consumer(
        self: &Arc<Self>,
        mut subscription: BusSubscription,
        token: CancellationToken,
        room_id: Option<Uuid>,
    ) {
        let bridge = Arc::clone(self);
        let channel = subscription.channel().to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = subscription.recv() => match next {
                        Some(raw) => {
                            bridge.dispatch(&raw);
                        }
                        None => {
                            warn!(%channel, "Bus channel closed");
                            break;
                        }
                    },
                }
            }

            drop(subscription);
            if let Some(room_id) = room_id {
                token.cancel();
                bridge.room_tasks.remove_if(&room_id, |_, t| t.is_cancelled());
            }
            if let Err(e) = bridge.bus.unsubscribe(&channel).await {
                warn!(%channel, error = %e, "Bus unsubscribe failed");
            }
            debug!(%channel, "Bus consumer stopped");
        });
    }
}
