//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use whisper_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_OUTBOUND_QUEUE, MAX_MESSAGE_SIZE};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP + WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:9179`
    pub http_addr: SocketAddr,

    /// Directory of the browser client, served as the fallback route.
    /// Env: `STATIC_DIR`
    /// Default: `./public`
    pub static_dir: PathBuf,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Whisper"`
    pub instance_name: String,

    /// Largest inbound WebSocket message in bytes. Media travels inline as
    /// base64, so this needs to be generous.
    /// Env: `MAX_MESSAGE_SIZE`
    /// Default: 50 MiB
    pub max_message_size: usize,

    /// Per-connection outbound event queue depth.
    /// Env: `OUTBOUND_QUEUE_CAPACITY`
    /// Default: `256`
    pub outbound_queue_capacity: usize,

    /// Sustained HTTP requests per second per IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// HTTP burst size per IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            static_dir: PathBuf::from("./public"),
            instance_name: "Whisper".to_string(),
            max_message_size: MAX_MESSAGE_SIZE,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        parse_into(&lookup, "HTTP_ADDR", &mut config.http_addr);

        if let Some(dir) = lookup("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        parse_into(&lookup, "MAX_MESSAGE_SIZE", &mut config.max_message_size);
        parse_into(
            &lookup,
            "OUTBOUND_QUEUE_CAPACITY",
            &mut config.outbound_queue_capacity,
        );
        parse_rate(&lookup, "RATE_LIMIT_PER_SEC", &mut config.rate_limit_per_sec);
        parse_rate(&lookup, "RATE_LIMIT_BURST", &mut config.rate_limit_burst);

        if config.outbound_queue_capacity == 0 {
            tracing::warn!("OUTBOUND_QUEUE_CAPACITY must be positive, using default");
            config.outbound_queue_capacity = DEFAULT_OUTBOUND_QUEUE;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Overwrite `slot` with the parsed value of `key`, warning and keeping the
/// default when it does not parse.
fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "Invalid value, using default"),
    }
}

/// Like [`parse_into`], but also rejects negative and non-finite rates.
fn parse_rate(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut f64) {
    let mut value = *slot;
    parse_into(lookup, key, &mut value);
    if value.is_finite() && value >= 0.0 {
        *slot = value;
    } else {
        tracing::warn!(key, value, "Invalid value, using default");
    }
}
