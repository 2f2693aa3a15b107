use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::metrics::{ConnectionMetrics, StoreMetrics};
use crate::server::AppState;

use super::message::OutboundMessage;
use super::session::Session;

/// WebSocket upgrade handler for `/ws/{user_id}`
#[tracing::instrument(name = "ws.upgrade", skip_all)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    tracing::info!(user_id = %user_id, "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Drive an established WebSocket connection until either side goes away
#[tracing::instrument(
    name = "ws.connection",
    skip(socket, state),
    fields(otel.kind = "server")
)]
async fn handle_socket(mut socket: WebSocket, state: AppState, user_id: String) {
    let connection_start = Instant::now();
    let buffer = state.settings.websocket.channel_buffer_size.max(1);
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(buffer);

    let handle = match state.registry.connect(user_id.clone(), tx) {
        Ok(h) => h,
        Err(e) => {
            ConnectionMetrics::record_rejected();
            tracing::warn!(error = %e, "Connection rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    let connection_id = handle.id;
    ConnectionMetrics::record_opened();

    let mut session = Session::new(handle, state.registry.clone(), state.service.clone());
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer: drains the outbound channel into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    match session.open().await {
        Ok(_) => {
            tracing::info!(connection_id = %connection_id, "WebSocket connection established");

            // Reader: one frame at a time, in arrival order
            let receive_loop = async {
                while let Some(result) = ws_receiver.next().await {
                    match result {
                        Ok(Message::Text(text)) => {
                            session.handle_text(text.as_str()).await;
                        }
                        Ok(Message::Close(_)) => {
                            tracing::debug!(connection_id = %connection_id, "Received close frame");
                            break;
                        }
                        // Binary frames are not part of the protocol; ping/pong is handled by axum
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                            break;
                        }
                    }
                }
            };

            tokio::select! {
                _ = &mut send_task => {
                    tracing::debug!(connection_id = %connection_id, "Send task completed");
                }
                _ = receive_loop => {
                    tracing::debug!(connection_id = %connection_id, "Receive loop completed");
                }
            }
        }
        Err(e) => {
            StoreMetrics::record_error("snapshot");
            tracing::warn!(connection_id = %connection_id, error = %e, "Failed to load snapshot, closing connection");
        }
    }

    send_task.abort();
    session.close();

    let duration = connection_start.elapsed().as_secs_f64();
    ConnectionMetrics::record_closed(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}
