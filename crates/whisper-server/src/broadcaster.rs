use std::sync::Arc;

use tracing::debug;

use whisper_shared::ServerEvent;

use crate::connections::ConnectionRegistry;
use crate::presence::PresenceRegistry;

/// Pushes the whole presence snapshot to every open connection. No deltas:
/// a refresh with no intervening change sends identical content again.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    presence: Arc<PresenceRegistry>,
    connections: Arc<ConnectionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(presence: Arc<PresenceRegistry>, connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            presence,
            connections,
        }
    }

    /// Returns the number of connections that accepted the snapshot.
    pub async fn refresh(&self) -> usize {
        let snapshot = self.presence.snapshot().await;
        let users = snapshot.len();
        let reached = self.connections.broadcast(ServerEvent::UserList(snapshot)).await;
        debug!(users, reached, "Presence broadcast");
        reached
    }
}

#[cfg(test)]
mod tests {
    use whisper_shared::{ConnectionId, Username};

    use super::*;
    use crate::sessions::SessionTable;

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let presence = Arc::new(PresenceRegistry::new(Arc::new(SessionTable::new())));
        let connections = Arc::new(ConnectionRegistry::new(8));
        let broadcaster = PresenceBroadcaster::new(presence.clone(), connections.clone());

        let (_, mut rx) = connections.open().await;
        presence
            .set_online(Username::parse("alice").unwrap(), ConnectionId::new())
            .await;

        assert_eq!(broadcaster.refresh().await, 1);
        assert_eq!(broadcaster.refresh().await, 1);

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first, second);

        let ServerEvent::UserList(entries) = first else {
            panic!("expected userList");
        };
        assert_eq!(entries.len(), 1);
        assert!(entries[0].online);
    }

    #[tokio::test]
    async fn test_refresh_reaches_unregistered_connections() {
        let presence = Arc::new(PresenceRegistry::new(Arc::new(SessionTable::new())));
        let connections = Arc::new(ConnectionRegistry::new(8));
        let broadcaster = PresenceBroadcaster::new(presence, connections.clone());

        let (_, mut rx) = connections.open().await;
        broadcaster.refresh().await;

        assert_eq!(rx.try_recv().unwrap(), ServerEvent::UserList(vec![]));
    }
}
