//! WebSocket push channel.
//!
//! Every connected client receives each saved event as a
//! `{"type":"newData","data":{...}}` text frame. There is no replay: a client
//! that reconnects must re-fetch history.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;

/// Handle WebSocket upgrade.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward sync messages to one client until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut subscriber = state.sync.subscribe();
    info!(
        %connection_id,
        subscribers = state.sync.subscriber_count(),
        "Viewer connected"
    );

    loop {
        tokio::select! {
            message = subscriber.recv() => {
                let Some(message) = message else { break };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%connection_id, error = %e, "Failed to encode sync message");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(other)) => {
                        debug!(%connection_id, ?other, "Ignoring viewer message");
                    }
                    Some(Err(e)) => {
                        warn!(%connection_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    info!(%connection_id, "Viewer disconnected");
}
