//! # whisper-server
//!
//! Realtime private-messaging server.
//!
//! This binary provides:
//! - **WebSocket endpoint** (`/ws`) speaking the JSON event protocol from
//!   `whisper-shared`: registration, presence lists, history, and private
//!   messages
//! - **In-memory chat core**: session table, presence registry, and
//!   per-pair conversation logs, all process-lifetime
//! - **Static hosting** for the browser client, plus `/health` and `/info`
//! - **Per-IP rate limiting** on the HTTP surface

mod api;
mod broadcaster;
mod config;
mod connections;
mod conversations;
mod dispatcher;
mod error;
mod hub;
mod presence;
mod rate_limit;
mod sessions;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::hub::ChatHub;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,whisper_server=debug")),
        )
        .init();

    info!("Starting Whisper server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let hub = Arc::new(ChatHub::new(config.outbound_queue_capacity));
    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    // Evict buckets idle for 10 minutes, checking every 5.
    let _purge_task = rate_limiter.spawn_purge(Duration::from_secs(300), Duration::from_secs(600));

    let http_addr = config.http_addr;
    let app_state = AppState {
        hub,
        rate_limiter,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
