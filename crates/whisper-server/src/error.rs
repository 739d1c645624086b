use thiserror::Error;
use whisper_shared::{ProtocolError, UsernameError};

/// Per-event failures. None of these close the connection; the socket loop
/// logs them and moves on to the next frame.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Connection is not registered")]
    NotRegistered,

    #[error("Invalid username: {0}")]
    InvalidUsername(UsernameError),

    #[error("Invalid peer: {0}")]
    InvalidPeer(UsernameError),

    #[error("Missing recipient")]
    MissingRecipient,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ChatError {
    /// Whether this is routine client behavior rather than something worth
    /// a warning.
    pub fn is_benign(&self) -> bool {
        matches!(self, ChatError::NotRegistered | ChatError::MissingRecipient)
    }
}
