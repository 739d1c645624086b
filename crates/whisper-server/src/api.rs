use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::Method,
    middleware,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use whisper_shared::constants::WS_PATH;

use crate::config::ServerConfig;
use crate::hub::{ChatHub, HubStats};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::ws::handle_connection;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ChatHub>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route(WS_PATH, get(ws_upgrade))
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    #[serde(flatten)]
    stats: HubStats,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        stats: state.hub.stats().await,
    })
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub.clone();
    ws.max_message_size(state.config.max_message_size)
        .max_frame_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_connection(socket, hub))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting HTTP/WebSocket server");
    serve_on(listener, state).await
}

async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use tempfile::TempDir;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
    use whisper_shared::{ClientEvent, PrivateMessage, ServerEvent};

    use super::*;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// The returned `TempDir` holds the static root; keep it alive for the test.
    async fn start() -> (SocketAddr, AppState, TempDir) {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>whisper</h1>").unwrap();

        let config = ServerConfig {
            static_dir: static_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let state = AppState {
            hub: Arc::new(ChatHub::new(config.outbound_queue_capacity)),
            rate_limiter: RateLimiter::new(1000.0, 1000.0),
            config: Arc::new(config),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_on(listener, state.clone()));
        (addr, state, static_dir)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{WS_PATH}"))
            .await
            .unwrap();
        ws
    }

    async fn emit(ws: &mut Client, event: ClientEvent) {
        ws.send(Message::Text(event.to_json().unwrap().into()))
            .await
            .unwrap();
    }

    /// Next event that is not a presence snapshot.
    async fn next_event(ws: &mut Client) -> ServerEvent {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for event")
                .expect("stream ended")
                .unwrap();
            let Ok(text) = frame.to_text() else {
                continue;
            };
            let event = ServerEvent::from_json(text).unwrap();
            if !matches!(event, ServerEvent::UserList(_)) {
                return event;
            }
        }
    }

    async fn wait_for_online(state: &AppState, online: usize) {
        for _ in 0..100 {
            if state.hub.stats().await.online == online {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("never reached {online} online users");
    }

    #[tokio::test]
    async fn test_websocket_message_flow() {
        let (addr, state, _static_dir) = start().await;
        let mut alice = connect(addr).await;
        let mut bob = connect(addr).await;

        emit(&mut alice, ClientEvent::Register("alice".into())).await;
        emit(&mut bob, ClientEvent::Register("bob".into())).await;
        wait_for_online(&state, 2).await;

        emit(
            &mut alice,
            ClientEvent::PrivateMessage(PrivateMessage {
                to: Some("bob".into()),
                message: Some("hello".into()),
                ..Default::default()
            }),
        )
        .await;

        match next_event(&mut bob).await {
            ServerEvent::ReceiveMessage(m) => {
                assert_eq!(m.from.as_str(), "alice");
                assert_eq!(m.message, "hello");
            }
            other => panic!("unexpected {other:?}"),
        }
        match next_event(&mut alice).await {
            ServerEvent::MessageSent(m) => assert_eq!(m.to.as_str(), "bob"),
            other => panic!("unexpected {other:?}"),
        }

        emit(&mut bob, ClientEvent::GetHistory("alice".into())).await;
        match next_event(&mut bob).await {
            ServerEvent::ChatHistory(log) => assert_eq!(log.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_marks_user_offline() {
        let (addr, state, _static_dir) = start().await;
        let mut alice = connect(addr).await;
        emit(&mut alice, ClientEvent::Register("alice".into())).await;
        wait_for_online(&state, 1).await;

        alice.close(None).await.unwrap();
        wait_for_online(&state, 0).await;
        assert_eq!(state.hub.stats().await.users, 1);
    }

    #[tokio::test]
    async fn test_garbage_frame_keeps_connection() {
        let (addr, state, _static_dir) = start().await;
        let mut alice = connect(addr).await;

        alice.send(Message::Text("nonsense".into())).await.unwrap();
        emit(&mut alice, ClientEvent::Register("alice".into())).await;
        wait_for_online(&state, 1).await;
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let (addr, _state, _static_dir) = start().await;

        let body = http_get(addr, "/health").await;
        assert!(body.contains("\"status\":\"ok\""));

        let body = http_get(addr, "/info").await;
        assert!(body.contains("\"name\":\"Whisper\""));
        assert!(body.contains("\"online\":0"));

        let body = http_get(addr, "/index.html").await;
        assert!(body.contains("<h1>whisper</h1>"));
    }

    /// Minimal HTTP/1.0 GET returning the raw response.
    async fn http_get(addr: SocketAddr, path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {path} HTTP/1.0\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }
}
