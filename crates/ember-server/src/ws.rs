//! WebSocket endpoint that binds a user to a live push handle.
//!
//! A connecting client supplies its (already authenticated) user id as a
//! query parameter.  The socket is registered in the presence map for the
//! duration of the connection and deregistered on disconnect; events queued
//! for the user are serialized as JSON text frames.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use ember_shared::UserId;

use crate::api::AppState;
use crate::presence::ConnectionHandle;

#[derive(Deserialize)]
pub struct WsQuery {
    pub user_id: UserId,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, query.user_id, socket))
}

async fn handle_socket(state: AppState, user_id: UserId, socket: WebSocket) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(tx);
    let conn_id = handle.conn_id;

    state.presence.register(user_id, handle).await;
    info!(user = %user_id, conn = %conn_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                // `None` means the registry dropped our sender because a
                // newer connection superseded this one.
                let Some(event) = event else { break };

                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize event");
                        continue;
                    }
                };

                if sink.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    // Clients do not send anything meaningful upstream;
                    // ping/pong is handled by axum.
                    Some(Ok(other)) => {
                        debug!(user = %user_id, frame = ?other, "ignoring inbound frame");
                    }
                }
            }
        }
    }

    state.presence.unregister(user_id, conn_id).await;
    info!(user = %user_id, conn = %conn_id, "websocket disconnected");
}
