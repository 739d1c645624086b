use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{CONVERSATION_KEY_SEPARATOR, MAX_USERNAME_LEN};
use crate::error::UsernameError;

/// A registered chat name. Case-sensitive, trimmed, never empty.
///
/// Construction goes through [`Username::parse`] so that every value in the
/// system is free of the conversation key separator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(raw: &str) -> Result<Self, UsernameError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(UsernameError::Empty);
        }

        let len = name.chars().count();
        if len > MAX_USERNAME_LEN {
            return Err(UsernameError::TooLong {
                len,
                max: MAX_USERNAME_LEN,
            });
        }

        if name.contains(CONVERSATION_KEY_SEPARATOR) {
            return Err(UsernameError::ReservedCharacter(CONVERSATION_KEY_SEPARATOR));
        }

        if let Some(c) = name.chars().find(|c| c.is_control()) {
            return Err(UsernameError::ControlCharacter(c.escape_unicode().to_string()));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// Server-side handle for one live WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a message carries. Only `Text` uses the text body; every other
/// kind carries a media reference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Gif,
    Video,
}

impl MessageKind {
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_trimmed() {
        let name = Username::parse("  alice \t").unwrap();
        assert_eq!(name.as_str(), "alice");
    }

    #[test]
    fn test_username_is_case_sensitive() {
        let lower = Username::parse("bob").unwrap();
        let upper = Username::parse("Bob").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_username_rejects_blank() {
        assert!(matches!(Username::parse("   "), Err(UsernameError::Empty)));
        assert!(matches!(Username::parse(""), Err(UsernameError::Empty)));
    }

    #[test]
    fn test_username_rejects_separator() {
        assert!(matches!(
            Username::parse("a|b"),
            Err(UsernameError::ReservedCharacter('|'))
        ));
    }

    #[test]
    fn test_username_rejects_control_chars() {
        assert!(matches!(
            Username::parse("bad\u{7}name"),
            Err(UsernameError::ControlCharacter(_))
        ));
    }

    #[test]
    fn test_username_length_limit_counts_chars() {
        let at_limit = "é".repeat(MAX_USERNAME_LEN);
        assert!(Username::parse(&at_limit).is_ok());

        let over = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(
            Username::parse(&over),
            Err(UsernameError::TooLong { .. })
        ));
    }

    #[test]
    fn test_username_deserialize_validates() {
        let ok: Username = serde_json::from_str("\" carol \"").unwrap();
        assert_eq!(ok.as_str(), "carol");
        assert!(serde_json::from_str::<Username>("\"x|y\"").is_err());
    }

    #[test]
    fn test_message_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MessageKind::Gif).unwrap(), "\"gif\"");
        let kind: MessageKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(kind, MessageKind::Video);
        assert!(kind.is_media());
        assert!(!MessageKind::default().is_media());
    }
}
