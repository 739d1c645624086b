//! Connection ↔ username binding.
//!
//! Both directions live behind one lock so a rebind can never leave the
//! forward and reverse maps disagreeing.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use whisper_shared::{ConnectionId, Username};

#[derive(Default)]
struct Bindings {
    by_user: HashMap<Username, ConnectionId>,
    by_conn: HashMap<ConnectionId, Username>,
}

/// Outcome of [`SessionTable::bind`], describing what the new binding
/// displaced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Rebind {
    /// Connection that previously held this username and is now orphaned.
    pub orphaned: Option<ConnectionId>,
    /// Username this connection held before, now released.
    pub released: Option<Username>,
}

#[derive(Default)]
pub struct SessionTable {
    inner: RwLock<Bindings>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conn` to `username`, replacing any earlier binding on either
    /// side. An orphaned connection stays open but is no longer reachable by
    /// name, and its own reverse entry is dropped.
    pub async fn bind(&self, conn: ConnectionId, username: Username) -> Rebind {
        let mut inner = self.inner.write().await;

        let released = inner
            .by_conn
            .remove(&conn)
            .filter(|prev| *prev != username);
        if let Some(prev) = &released {
            inner.by_user.remove(prev);
        }

        let orphaned = inner
            .by_user
            .insert(username.clone(), conn)
            .filter(|prev| *prev != conn);
        if let Some(old) = orphaned {
            inner.by_conn.remove(&old);
            debug!(user = %username, old = %old.short(), new = %conn.short(), "Username moved to new connection");
        }

        inner.by_conn.insert(conn, username);

        Rebind { orphaned, released }
    }

    /// Drop whatever binding `conn` holds. `None` means it had none, which
    /// is the normal case for connections that never registered.
    pub async fn unbind(&self, conn: ConnectionId) -> Option<Username> {
        let mut inner = self.inner.write().await;
        let username = inner.by_conn.remove(&conn)?;
        if inner.by_user.get(&username) == Some(&conn) {
            inner.by_user.remove(&username);
        }
        Some(username)
    }

    pub async fn lookup_connection(&self, username: &Username) -> Option<ConnectionId> {
        self.inner.read().await.by_user.get(username).copied()
    }

    pub async fn lookup_username(&self, conn: ConnectionId) -> Option<Username> {
        self.inner.read().await.by_conn.get(&conn).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_user.len()
    }
}
