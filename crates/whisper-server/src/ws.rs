//! WebSocket connection lifecycle.
//!
//! One reader loop handles inbound frames strictly in order, which keeps
//! each sender's messages FIFO. A separate writer task drains the
//! connection's outbox onto the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, warn};

use whisper_shared::ProtocolError;

use crate::error::ChatError;
use crate::hub::ChatHub;

pub async fn handle_connection(socket: WebSocket, hub: Arc<ChatHub>) {
    let (conn, mut outbox) = hub.connect().await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let json = match event.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!(conn = %conn.short(), error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(frame) = ws_receiver.next().await {
        let result = match frame {
            Ok(Message::Text(text)) => hub.handle_frame(conn, text.as_str()).await,
            Ok(Message::Binary(_)) => Err(ProtocolError::BinaryFrame.into()),
            Ok(Message::Close(_)) => break,
            // Pings are answered by axum; pongs need nothing.
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(conn = %conn.short(), error = %e, "WebSocket receive error");
                break;
            }
        };

        if let Err(e) = result {
            log_rejected(conn.short(), &e);
        }
    }

    // Closing the outbox ends the writer.
    hub.disconnect(conn).await;
    if let Err(e) = writer.await {
        warn!(conn = %conn.short(), error = %e, "WebSocket writer task failed");
    }
}

fn log_rejected(conn: String, err: &ChatError) {
    if err.is_benign() {
        debug!(conn = %conn, reason = %err, "Event ignored");
    } else {
        warn!(conn = %conn, reason = %err, "Event rejected");
    }
}
