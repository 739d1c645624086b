//! Private message dispatch: persist, deliver live, confirm.

use std::sync::Arc;

use chrono::Utc;

use whisper_shared::{ChatMessage, ConnectionId, PrivateMessage, ServerEvent, Username};

use crate::broadcaster::PresenceBroadcaster;
use crate::connections::ConnectionRegistry;
use crate::conversations::ConversationStore;
use crate::error::ChatError;
use crate::presence::PresenceRegistry;
use crate::sessions::SessionTable;

/// Result of a successful [`MessageDispatcher::send`].
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// The message as stored
    pub message: ChatMessage,
    /// Whether it was queued on the recipient's live connection
    pub delivered: bool,
    /// Whether the sender's confirmation was queued
    pub confirmed: bool,
}

#[derive(Clone)]
pub struct MessageDispatcher {
    sessions: Arc<SessionTable>,
    presence: Arc<PresenceRegistry>,
    conversations: Arc<ConversationStore>,
    connections: Arc<ConnectionRegistry>,
    broadcaster: PresenceBroadcaster,
}

impl MessageDispatcher {
    pub fn new(
        sessions: Arc<SessionTable>,
        presence: Arc<PresenceRegistry>,
        conversations: Arc<ConversationStore>,
        connections: Arc<ConnectionRegistry>,
        broadcaster: PresenceBroadcaster,
    ) -> Self {
        Self {
            sessions,
            presence,
            conversations,
            connections,
            broadcaster,
        }
    }

    /// Send a message on behalf of `from_conn`.
    ///
    /// The message is stored before any delivery attempt, so history holds
    /// it even when the recipient is offline or has never registered. The
    /// sender always gets `messageSent`; the recipient gets `receiveMessage`
    /// only while online.
    pub async fn send(
        &self,
        from_conn: ConnectionId,
        request: PrivateMessage,
    ) -> Result<Dispatch, ChatError> {
        let from = self
            .sessions
            .lookup_username(from_conn)
            .await
            .ok_or(ChatError::NotRegistered)?;

        let to = match request.to.as_deref().map(str::trim) {
            None | Some("") => return Err(ChatError::MissingRecipient),
            Some(raw) => Username::parse(raw).map_err(ChatError::InvalidPeer)?,
        };

        let draft = ChatMessage::new(
            from.clone(),
            to.clone(),
            Utc::now(),
            request.kind.unwrap_or_default(),
            request.message,
            request.media,
        );
        let message = self.conversations.append(&from, &to, draft).await;

        let delivered = match self.presence.route(&to).await {
            Some(conn) => {
                self.connections
                    .send_to(conn, ServerEvent::ReceiveMessage(message.clone()))
                    .await
            }
            None => false,
        };

        let confirmed = self
            .connections
            .send_to(from_conn, ServerEvent::MessageSent(message.clone()))
            .await;

        // Sending changes no presence state; this only mirrors the refresh
        // clients have come to expect after each message.
        self.broadcaster.refresh().await;

        Ok(Dispatch {
            message,
            delivered,
            confirmed,
        })
    }
}
