//! Append-only per-pair message logs.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::RwLock;
use tracing::debug;

use whisper_shared::constants::CONVERSATION_KEY_SEPARATOR;
use whisper_shared::{ChatMessage, Username};

/// Order-independent identifier for a pair of users: the two names sorted
/// and joined with [`CONVERSATION_KEY_SEPARATOR`], which [`Username`] never
/// contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(a: &Username, b: &Username) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}{CONVERSATION_KEY_SEPARATOR}{hi}"))
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
pub struct ConversationStore {
    logs: RwLock<HashMap<ConversationKey, Vec<ChatMessage>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the log for `(a, b)`, creating it on first use.
    ///
    /// `time` is raised to the previous entry's time if the wall clock
    /// stepped backwards, so each log stays non-decreasing. Returns the
    /// message as stored.
    pub async fn append(&self, a: &Username, b: &Username, mut message: ChatMessage) -> ChatMessage {
        let key = ConversationKey::new(a, b);
        let mut logs = self.logs.write().await;
        let log = logs.entry(key.clone()).or_default();

        if let Some(last) = log.last() {
            if message.time < last.time {
                message.time = last.time;
            }
        }

        log.push(message.clone());
        debug!(conversation = %key, position = log.len() - 1, "Message appended");
        message
    }

    /// Full log for `(a, b)`, oldest first. Empty for a pair that never
    /// talked.
    pub async fn history(&self, a: &Username, b: &Username) -> Vec<ChatMessage> {
        self.logs
            .read()
            .await
            .get(&ConversationKey::new(a, b))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn conversation_count(&self) -> usize {
        self.logs.read().await.len()
    }
}
