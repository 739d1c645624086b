/// Application name
pub const APP_NAME: &str = "Whisper";

/// Joins the two sorted usernames of a conversation key. Usernames may never
/// contain it.
pub const CONVERSATION_KEY_SEPARATOR: char = '|';

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 64;

/// Maximum inbound WebSocket message size in bytes (50 MiB, room for
/// base64-encoded media)
pub const MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// Default per-connection outbound event queue depth
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Default HTTP/WebSocket port (server)
pub const DEFAULT_HTTP_PORT: u16 = 9179;

/// WebSocket endpoint path
pub const WS_PATH: &str = "/ws";
