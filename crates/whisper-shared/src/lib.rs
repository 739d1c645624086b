//! # whisper-shared
//!
//! Types shared between the Whisper server and its clients: usernames,
//! connection handles, and the JSON event protocol spoken over the
//! WebSocket.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{ProtocolError, UsernameError};
pub use protocol::{ChatMessage, ClientEvent, PresenceEntry, PrivateMessage, ServerEvent};
pub use types::{ConnectionId, MessageKind, Username};
