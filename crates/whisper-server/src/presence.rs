//! Online/offline status and last-seen times, layered over the
//! [`SessionTable`].
//!
//! Lock order is always presence state first, then the session table. Every
//! binding change goes through here, so the presence lock also serializes
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use whisper_shared::{ConnectionId, PresenceEntry, Username};

use crate::sessions::{Rebind, SessionTable};

#[derive(Debug, Clone)]
struct UserRecord {
    online: bool,
    last_seen: DateTime<Utc>,
}

#[derive(Default)]
struct PresenceState {
    users: HashMap<Username, UserRecord>,
    /// First-registration order, for a stable snapshot.
    order: Vec<Username>,
}

impl PresenceState {
    fn mark_online(&mut self, username: &Username, now: DateTime<Utc>) {
        match self.users.get_mut(username) {
            Some(record) => {
                record.online = true;
                record.last_seen = now;
            }
            None => {
                self.users.insert(
                    username.clone(),
                    UserRecord {
                        online: true,
                        last_seen: now,
                    },
                );
                self.order.push(username.clone());
            }
        }
    }

    fn mark_offline(&mut self, username: &Username, now: DateTime<Utc>) -> bool {
        match self.users.get_mut(username) {
            Some(record) => {
                record.online = false;
                record.last_seen = now;
                true
            }
            None => false,
        }
    }
}

pub struct PresenceRegistry {
    sessions: Arc<SessionTable>,
    state: RwLock<PresenceState>,
}

impl PresenceRegistry {
    pub fn new(sessions: Arc<SessionTable>) -> Self {
        Self {
            sessions,
            state: RwLock::new(PresenceState::default()),
        }
    }

    /// Mark `username` online on `conn`, creating the record on first sight.
    /// A name previously held by `conn` goes offline.
    pub async fn set_online(&self, username: Username, conn: ConnectionId) -> Rebind {
        let mut state = self.state.write().await;
        let rebind = self.sessions.bind(conn, username.clone()).await;
        let now = Utc::now();

        if let Some(released) = &rebind.released {
            state.mark_offline(released, now);
            debug!(user = %released, conn = %conn.short(), "Released previous username");
        }
        state.mark_online(&username, now);

        info!(user = %username, conn = %conn.short(), "User online");
        rebind
    }

    /// Mark `username` offline and clear its binding, provided `conn` still
    /// holds it. A name that moved to a newer connection is left alone.
    pub async fn set_offline(&self, username: &Username, conn: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        if self.sessions.lookup_connection(username).await != Some(conn) {
            return false;
        }
        self.sessions.unbind(conn).await;
        state.mark_offline(username, Utc::now());
        info!(user = %username, conn = %conn.short(), "User offline");
        true
    }

    /// Connection teardown. Only a connection that still holds its binding
    /// takes its user offline.
    pub async fn disconnect(&self, conn: ConnectionId) -> Option<Username> {
        let username = self.sessions.lookup_username(conn).await?;
        self.set_offline(&username, conn).await.then_some(username)
    }

    /// The live connection for `username`, if it is online.
    pub async fn route(&self, username: &Username) -> Option<ConnectionId> {
        let state = self.state.read().await;
        if !state.users.get(username).is_some_and(|r| r.online) {
            return None;
        }
        self.sessions.lookup_connection(username).await
    }

    /// Every known user in first-registration order.
    pub async fn snapshot(&self) -> Vec<PresenceEntry> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|name| {
                state.users.get(name).map(|record| PresenceEntry {
                    username: name.clone(),
                    online: record.online,
                    last_seen: record.last_seen,
                })
            })
            .collect()
    }

    /// `(known, online)` user counts.
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        let online = state.users.values().filter(|r| r.online).count();
        (state.users.len(), online)
    }
}
