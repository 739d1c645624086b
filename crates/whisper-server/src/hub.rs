//! The chat service graph, built once at startup and shared by every
//! connection task.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use whisper_shared::{ClientEvent, ConnectionId, PrivateMessage, ServerEvent, Username};

use crate::broadcaster::PresenceBroadcaster;
use crate::connections::ConnectionRegistry;
use crate::conversations::ConversationStore;
use crate::dispatcher::{Dispatch, MessageDispatcher};
use crate::error::ChatError;
use crate::presence::PresenceRegistry;
use crate::sessions::SessionTable;

#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub users: usize,
    pub online: usize,
    pub bound: usize,
    pub conversations: usize,
    pub connections: usize,
}

pub struct ChatHub {
    sessions: Arc<SessionTable>,
    presence: Arc<PresenceRegistry>,
    conversations: Arc<ConversationStore>,
    connections: Arc<ConnectionRegistry>,
    broadcaster: PresenceBroadcaster,
    dispatcher: MessageDispatcher,
}

impl ChatHub {
    pub fn new(outbound_queue_capacity: usize) -> Self {
        let sessions = Arc::new(SessionTable::new());
        let presence = Arc::new(PresenceRegistry::new(sessions.clone()));
        let conversations = Arc::new(ConversationStore::new());
        let connections = Arc::new(ConnectionRegistry::new(outbound_queue_capacity));
        let broadcaster = PresenceBroadcaster::new(presence.clone(), connections.clone());
        let dispatcher = MessageDispatcher::new(
            sessions.clone(),
            presence.clone(),
            conversations.clone(),
            connections.clone(),
            broadcaster.clone(),
        );

        Self {
            sessions,
            presence,
            conversations,
            connections,
            broadcaster,
            dispatcher,
        }
    }

    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        self.connections.open().await
    }

    /// Route one inbound event. Errors describe why the event was a no-op;
    /// they never affect the connection or anyone else's state.
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) -> Result<(), ChatError> {
        match event {
            ClientEvent::Register(raw) => self.register(conn, &raw).await.map(|_| ()),
            ClientEvent::RequestUserList => {
                self.broadcaster.refresh().await;
                Ok(())
            }
            ClientEvent::GetHistory(peer) => self.send_history(conn, &peer).await,
            ClientEvent::PrivateMessage(request) => {
                let dispatch = self.private_message(conn, request).await?;
                debug!(
                    from = %dispatch.message.from,
                    to = %dispatch.message.to,
                    kind = %dispatch.message.kind,
                    delivered = dispatch.delivered,
                    confirmed = dispatch.confirmed,
                    "Private message dispatched"
                );
                Ok(())
            }
        }
    }

    /// Parse and route one text frame.
    pub async fn handle_frame(&self, conn: ConnectionId, text: &str) -> Result<(), ChatError> {
        let event = ClientEvent::from_json(text)?;
        self.handle(conn, event).await
    }

    pub async fn register(&self, conn: ConnectionId, raw: &str) -> Result<Username, ChatError> {
        let username = Username::parse(raw).map_err(ChatError::InvalidUsername)?;
        let rebind = self.presence.set_online(username.clone(), conn).await;
        if let Some(old) = rebind.orphaned {
            info!(user = %username, old = %old.short(), "Earlier connection no longer reachable by name");
        }
        self.broadcaster.refresh().await;
        Ok(username)
    }

    /// Reply to the requester only with its conversation with `peer`.
    pub async fn send_history(&self, conn: ConnectionId, peer: &str) -> Result<(), ChatError> {
        let me = self
            .sessions
            .lookup_username(conn)
            .await
            .ok_or(ChatError::NotRegistered)?;
        let peer = Username::parse(peer).map_err(ChatError::InvalidPeer)?;

        let messages = self.conversations.history(&me, &peer).await;
        debug!(user = %me, peer = %peer, count = messages.len(), "Sending history");
        self.connections
            .send_to(conn, ServerEvent::ChatHistory(messages))
            .await;
        Ok(())
    }

    pub async fn private_message(
        &self,
        conn: ConnectionId,
        request: PrivateMessage,
    ) -> Result<Dispatch, ChatError> {
        self.dispatcher.send(conn, request).await
    }

    /// Connection teardown: release the outbox, take the user offline if
    /// this connection still held the name, and tell everyone.
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.connections.close(conn).await;
        match self.presence.disconnect(conn).await {
            Some(username) => {
                info!(user = %username, conn = %conn.short(), "User disconnected");
                self.broadcaster.refresh().await;
            }
            None => debug!(conn = %conn.short(), "Unregistered connection closed"),
        }
    }

    pub async fn stats(&self) -> HubStats {
        let (users, online) = self.presence.counts().await;
        HubStats {
            users,
            online,
            bound: self.sessions.len().await,
            conversations: self.conversations.conversation_count().await,
            connections: self.connections.len().await,
        }
    }
}
