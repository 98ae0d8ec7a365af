// ============================
// crates/backend-lib/src/handlers/live.rs
// ============================
//! Live WebSocket channel for one room.
//!
//! The bearer token is resolved before the upgrade. Once upgraded, the
//! connection is registered, a writer task drains its outbound queue into the
//! socket, and the read loop hands every text frame to the broadcast router.
//! Whatever ends the read loop (close frame, read error, writer failure)
//! unregisters the connection and announces the departure.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use studyroom_common::RoomId;

use crate::auth::{bearer_token, UserIdentity};
use crate::error::AppError;
use crate::metrics::{WS_CONNECTION, WS_DISCONNECTION, WS_REJECTED};
use crate::registry::Connection;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub token: Option<String>,
}

/// `GET /api/v1/ws/rooms/{room_id}?token=<bearer>`
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    Query(query): Query<LiveQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = query
        .token
        .as_deref()
        .or_else(|| bearer_token(&headers))
        .ok_or(AppError::Unauthenticated);

    let identity = match token {
        Ok(token) => state.auth.resolve(token).await,
        Err(e) => Err(e),
    }
    .inspect_err(|_| {
        counter!(WS_REJECTED).increment(1);
        tracing::warn!(room_id, "live connection rejected, bad token");
    })?;

    let max_bytes = state.settings.live.max_message_bytes;
    Ok(ws
        .max_message_size(max_bytes)
        .max_frame_size(max_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, room_id, identity)))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_id: RoomId,
    identity: UserIdentity,
) {
    let (mut sink, mut stream) = socket.split();
    let (conn, mut outbound) = Connection::new(state.settings.live.channel_capacity);
    let conn_id = conn.id;
    let user_id = identity.user_id;
    let label = state
        .users
        .lookup(user_id)
        .unwrap_or_else(|| identity.username.clone());

    state.registry.register(room_id, conn);
    counter!(WS_CONNECTION).increment(1);
    tracing::info!(room_id, user_id, connection_id = %conn_id, "live connection opened");
    state.router.announce_arrival(room_id, &label);

    let send_timeout = Duration::from_millis(state.settings.live.send_timeout_ms);
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let msg = Message::Text(String::from(&*frame).into());
            match tokio::time::timeout(send_timeout, sink.send(msg)).await {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    tracing::debug!(connection_id = %conn_id, error = %e, "socket write failed");
                    break;
                },
                Err(_) => {
                    tracing::warn!(connection_id = %conn_id, "socket write timed out");
                    break;
                },
            }
        }
        let _ = sink.close().await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    state.router.on_event(room_id, conn_id, text.as_str());
                },
                Some(Ok(Message::Close(_))) | None => break,
                // Binary frames are ignored; pings are answered by the transport
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::debug!(room_id, connection_id = %conn_id, error = %e, "socket read failed");
                    break;
                },
            },
            _ = &mut writer => {
                writer_done = true;
                break;
            },
        }
    }

    state.registry.unregister(room_id, conn_id);
    if !writer_done {
        writer.abort();
    }
    state.router.announce_departure(room_id, &label);

    counter!(WS_DISCONNECTION).increment(1);
    tracing::info!(room_id, user_id, connection_id = %conn_id, "live connection closed");
}
