use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use whisper_shared::{ConnectionId, ServerEvent};

/// Outbound queues for every open WebSocket, registered or not.
///
/// Pushes use `try_send`: a slow or closed connection loses that one event
/// and never stalls the handler that produced it.
pub struct ConnectionRegistry {
    outboxes: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            outboxes: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Open a new connection. The receiver feeds the socket writer.
    pub async fn open(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let mut outboxes = self.outboxes.write().await;
        outboxes.insert(conn, tx);

        info!(conn = %conn.short(), connections = outboxes.len(), "Connection opened");
        (conn, rx)
    }

    pub async fn close(&self, conn: ConnectionId) {
        let mut outboxes = self.outboxes.write().await;
        if outboxes.remove(&conn).is_some() {
            info!(conn = %conn.short(), connections = outboxes.len(), "Connection closed");
        }
    }

    /// Queue `event` for one connection. Returns whether it was queued.
    pub async fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        let outboxes = self.outboxes.read().await;
        let Some(tx) = outboxes.get(&conn) else {
            debug!(conn = %conn.short(), event = event.name(), "No outbox for connection");
            return false;
        };
        push(conn, tx, event)
    }

    /// Queue a copy of `event` for every open connection. Returns how many
    /// accepted it.
    pub async fn broadcast(&self, event: ServerEvent) -> usize {
        let outboxes = self.outboxes.read().await;
        outboxes
            .iter()
            .filter(|(conn, tx)| push(**conn, tx, event.clone()))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.outboxes.read().await.len()
    }
}

fn push(conn: ConnectionId, tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
    let name = event.name();
    match tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(conn = %conn.short(), event = name, "Outbound queue full, dropping event");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(conn = %conn.short(), event = name, "Outbound queue closed");
            false
        }
    }
}
