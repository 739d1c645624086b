use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username is empty")]
    Empty,

    #[error("Username too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Username contains reserved character {0:?}")]
    ReservedCharacter(char),

    #[error("Username contains control character {0}")]
    ControlCharacter(String),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Binary frames are not supported")]
    BinaryFrame,
}
