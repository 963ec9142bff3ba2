//! Notification dispatcher: direct notifications and system events.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use flym_core::events::{EventPayload, InviteAccepted, InviteKind, SystemEvent};
use flym_core::result::AppResult;
use flym_core::traits::EventPublisher;

use crate::bridge::{BusEventPublisher, PubSubBridge};
use crate::message::types::ServerMessage;

/// Delivers out-of-band events to users regardless of the room they are in.
///
/// As an [`EventPublisher`] it turns a system event into deliveries on the
/// process that raised it: user notices go out on the notification channel,
/// room notices on that room's channel. The event itself is then written to
/// the system channel, whose consumers only record it.
#[derive(Debug)]
pub struct NotificationDispatcher {
    bridge: Arc<PubSubBridge>,
    system: BusEventPublisher,
    shutdown: CancellationToken,
}

fn invite_accepted_notice(accepted: &InviteAccepted) -> ServerMessage {
    ServerMessage::system(
        "invite_accepted",
        json!({
            "chatId": accepted.chat_id,
            "guestId": accepted.guest_id,
            "guestName": accepted.guest_name,
            "kind": accepted.kind,
            "participants": accepted.participants,
        }),
    )
}

fn participant_joined_notice(accepted: &InviteAccepted) -> ServerMessage {
    ServerMessage::system(
        "participant_joined",
        json!({
            "chatId": accepted.chat_id,
            "id": accepted.guest_id,
            "name": accepted.guest_name,
            "kind": "guest",
        }),
    )
}

impl NotificationDispatcher {
    pub fn new(bridge: Arc<PubSubBridge>, shutdown: CancellationToken) -> Self {
        let system = BusEventPublisher::new(bridge.bus().clone(), bridge.names().system());
        Self {
            bridge,
            system,
            shutdown,
        }
    }

    /// Send `message` to every live connection of `user_id` on every
    /// process. Nothing is queued for users without connections.
    pub async fn notify(&self, user_id: Uuid, message: ServerMessage) -> AppResult<()> {
        self.bridge.publish_to_user(user_id, message).await
    }

    /// Publish the realtime notices a system event calls for.
    pub async fn route(&self, event: &SystemEvent) -> AppResult<()> {
        match &event.payload {
            EventPayload::InviteAccepted(accepted) => {
                if accepted.kind == InviteKind::Group {
                    self.bridge
                        .publish_room_system(accepted.chat_id, participant_joined_notice(accepted))
                        .await?;
                }
                self.notify(accepted.inviter_id, invite_accepted_notice(accepted))
                    .await?;
                info!(
                    inviter_id = %accepted.inviter_id,
                    chat_id = %accepted.chat_id,
                    kind = ?accepted.kind,
                    "Invite acceptance published"
                );
            }
            EventPayload::GuestsPurged(_) => {}
        }
        Ok(())
    }

    /// Record a system event read from the system channel.
    pub fn handle_system_event(&self, event: &SystemEvent) {
        match &event.payload {
            EventPayload::InviteAccepted(accepted) => debug!(
                event_id = %event.id,
                inviter_id = %accepted.inviter_id,
                chat_id = %accepted.chat_id,
                "Invite accepted"
            ),
            EventPayload::GuestsPurged(summary) => debug!(
                event_id = %event.id,
                guests_removed = summary.guests_removed,
                rooms_deleted = summary.rooms_deleted,
                "Guest purge reported"
            ),
        }
    }

    /// Subscribe the system channel and start consuming it.
    pub async fn start(self: &Arc<Self>) -> AppResult<()> {
        let channel = self.bridge.names().system();
        let mut subscription = self.bridge.bus().subscribe(&channel).await?;
        let dispatcher = Arc::clone(self);
        let token = self.shutdown.child_token();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = subscription.recv() => match next {
                        Some(raw) => match serde_json::from_str::<SystemEvent>(&raw) {
                            Ok(event) => dispatcher.handle_system_event(&event),
                            Err(e) => warn!(error = %e, "Ignoring unknown system event"),
                        },
                        None => break,
                    },
                }
            }
            debug!(%channel, "System event consumer stopped");
        });
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for NotificationDispatcher {
    async fn publish(&self, event: SystemEvent) -> AppResult<()> {
        let routed = self.route(&event).await;
        self.system.publish(event).await?;
        routed
    }
}
