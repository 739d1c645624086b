use chrono::{DateTime, Utc};
use serde::de::value::StrDeserializer;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtocolError;
use crate::types::{MessageKind, Username};

/// Events sent by a client over its WebSocket.
///
/// Wire form: `{"event": "<camelCaseName>", "data": <payload>}`.
/// Names are kept as raw strings here; the server validates them so that a
/// bad name is a logged no-op instead of an unparseable frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to a username
    Register(String),

    /// Ask the server to push a fresh presence snapshot to everyone
    RequestUserList,

    /// Fetch the conversation with the given peer
    GetHistory(String),

    /// Send a text or media message
    PrivateMessage(PrivateMessage),
}

/// Payload of a `privateMessage` event. Every field is optional on the wire;
/// the dispatcher fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateMessage {
    pub to: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type", deserialize_with = "empty_kind_as_none")]
    pub kind: Option<MessageKind>,
    pub media: Option<String>,
}

/// Clients send `"type": ""` for plain text; treat it like an absent field.
fn empty_kind_as_none<'de, D>(deserializer: D) -> Result<Option<MessageKind>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => {
            let value: StrDeserializer<'_, D::Error> = raw.as_str().into_deserializer();
            MessageKind::deserialize(value).map(Some)
        }
    }
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full presence snapshot
    UserList(Vec<PresenceEntry>),

    /// Reply to `getHistory`, oldest first
    ChatHistory(Vec<ChatMessage>),

    /// Live delivery to the recipient
    ReceiveMessage(ChatMessage),

    /// Confirmation to the sender
    MessageSent(ChatMessage),
}

/// A stored private message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: Username,
    pub to: Username,
    /// Server-assigned arrival time
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text body, empty unless `kind` is text
    pub message: String,
    /// Opaque media reference (data URI, blob handle), `None` for text
    pub media: Option<String>,
}

impl ChatMessage {
    /// Build a message, keeping only the field that `kind` makes active.
    pub fn new(
        from: Username,
        to: Username,
        time: DateTime<Utc>,
        kind: MessageKind,
        text: Option<String>,
        media: Option<String>,
    ) -> Self {
        let (message, media) = if kind.is_media() {
            (String::new(), Some(media.unwrap_or_default()))
        } else {
            (text.unwrap_or_default(), None)
        };

        Self {
            from,
            to,
            time,
            kind,
            message,
            media,
        }
    }
}

/// One row of the presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub username: Username,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UserList(_) => "userList",
            Self::ChatHistory(_) => "chatHistory",
            Self::ReceiveMessage(_) => "receiveMessage",
            Self::MessageSent(_) => "messageSent",
        }
    }
}
