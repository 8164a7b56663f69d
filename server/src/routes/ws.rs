//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, the client joins its room and enters a `select!` loop:
//! - Incoming binary frames → decode + validate + dispatch by body channel
//! - Frames queued by room peers → forward to client
//!
//! Handler functions validate, authorize, mutate room state, and return an
//! `Outcome`. The dispatch layer owns all outbound concerns: reply to sender
//! and broadcast to peers.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → join room → send `session:welcome` → peers get `session:join`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / broadcast / both)
//! 4. Close → leave room → peers get `session:part` once the user's last
//!    connection is gone

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{Body, Frame, Participant, Role, SceneOp, SessionOp, ShellEvent, Status};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Done reply to the sender, request copy to every peer.
    Broadcast(Value),
    /// Relay to all room peers EXCLUDING sender. No reply to sender.
    BroadcastExcludeSender(Value),
    /// Send done+data to sender only.
    Reply(Value),
}

/// Who is on the other end of a connection.
#[derive(Clone, Debug)]
struct Connection {
    client_id: Uuid,
    room: String,
    participant: Participant,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(room) = params.get("room").filter(|r| !r.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "room required").into_response();
    };
    let Some(user_id) = params.get("user").filter(|u| !u.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "user required").into_response();
    };

    let role = match params.get("role").map(String::as_str) {
        Some("gm") => Role::Gm,
        None | Some("player") => Role::Player,
        Some(other) => return (StatusCode::BAD_REQUEST, format!("unknown role: {other}")).into_response(),
    };
    let name = params.get("name").cloned().unwrap_or_else(|| user_id.clone());

    let conn = Connection {
        client_id: Uuid::new_v4(),
        room: room.clone(),
        participant: Participant { id: user_id.clone(), name, role, active: true },
    };
    ws.on_upgrade(move |socket| run_ws(socket, state, conn))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, conn: Connection) {
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.queue_capacity);

    let welcome = join(&state, &conn, client_tx).await;
    if send_frame(&mut socket, &welcome).await.is_err() {
        leave(&state, &conn).await;
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Binary(bytes) => {
                        let replies = process_inbound_bytes(&state, &conn, &bytes).await;
                        if send_all(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Text(_) => {
                        warn!(client_id = %conn.client_id, "ws: text frames are not supported");
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    leave(&state, &conn).await;
}

/// Register the connection and announce it. Returns the welcome frame.
async fn join(state: &AppState, conn: &Connection, client_tx: mpsc::Sender<Frame>) -> Frame {
    let (participants, tokens) =
        services::room::join_room(state, &conn.room, conn.client_id, conn.participant.clone(), client_tx).await;

    let announce = Frame::session(&SessionOp::Join { participant: conn.participant.clone() })
        .with_room(conn.room.as_str())
        .with_from(conn.participant.id.as_str());
    services::room::broadcast(state, &conn.room, &announce, Some(conn.client_id)).await;

    info!(client_id = %conn.client_id, room = %conn.room, user_id = %conn.participant.id, "ws: client connected");
    Frame::session(&SessionOp::Welcome { participant: conn.participant.clone(), participants, tokens })
        .with_room(conn.room.as_str())
}

async fn leave(state: &AppState, conn: &Connection) {
    if let Some(gone) = services::room::part_room(state, &conn.room, conn.client_id).await {
        let part = Frame::session(&SessionOp::Part { user_id: gone.id.clone() })
            .with_room(conn.room.as_str())
            .with_from(gone.id.as_str());
        services::room::broadcast(state, &conn.room, &part, None).await;
    }
    info!(client_id = %conn.client_id, room = %conn.room, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and process one inbound binary frame and return frames for the
/// sender.
async fn process_inbound_bytes(state: &AppState, conn: &Connection, bytes: &[u8]) -> Vec<Frame> {
    let mut req = match frames::decode_frame(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            let mut err = Frame::session(&SessionOp::Error { code: "E_CODEC".into(), message: e.to_string() })
                .with_room(conn.room.as_str());
            err.status = Status::Error;
            return vec![err];
        }
    };

    // The connection decides room and sender, never the payload.
    req.room = Some(conn.room.clone());
    req.from = Some(conn.participant.id.clone());
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let body = match req.body() {
        Ok(body) => body,
        Err(e) => return vec![req.error_reply("E_CODEC", e.to_string())],
    };

    let result = match body {
        Body::Shell(event) => handle_shell(conn, &req, &event),
        Body::Scene(op) => handle_scene(state, conn, &req, op).await,
        Body::Session(_) => Err(req.error_reply("E_USAGE", "session frames are sent by the server")),
    };

    match result {
        Ok(Outcome::Broadcast(data)) => {
            let sender_frame = req.done_reply(data.clone());
            let peer_frame = Frame::new(req.syscall.clone(), data)
                .with_room(conn.room.as_str())
                .with_from(conn.participant.id.as_str());
            services::room::broadcast(state, &conn.room, &peer_frame, Some(conn.client_id)).await;
            vec![sender_frame]
        }
        Ok(Outcome::BroadcastExcludeSender(data)) => {
            let frame = Frame::new(req.syscall.clone(), data)
                .with_room(conn.room.as_str())
                .with_from(conn.participant.id.as_str());
            services::room::broadcast(state, &conn.room, &frame, Some(conn.client_id)).await;
            vec![]
        }
        Ok(Outcome::Reply(data)) => vec![req.done_reply(data)],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// SHELL HANDLER
// =============================================================================

/// Ready-check control is GM-only; a status may only speak for its sender.
fn handle_shell(conn: &Connection, req: &Frame, event: &ShellEvent) -> Result<Outcome, Frame> {
    match event {
        ShellEvent::Status { user_id, .. } => {
            if *user_id != conn.participant.id {
                return Err(req.error_reply("E_FORBIDDEN", "status may only be reported for yourself"));
            }
        }
        ShellEvent::StartCheck { .. } | ShellEvent::CloseCheck | ShellEvent::Countdown | ShellEvent::ClearTargets => {
            if !conn.participant.is_gm() {
                return Err(req.error_reply("E_FORBIDDEN", format!("{} is GM-only", event.kind())));
            }
        }
    }
    Ok(Outcome::BroadcastExcludeSender(req.data.clone()))
}

// =============================================================================
// SCENE HANDLER
// =============================================================================

async fn handle_scene(state: &AppState, conn: &Connection, req: &Frame, op: SceneOp) -> Result<Outcome, Frame> {
    let gm_only = matches!(op, SceneOp::TokenCreate { .. } | SceneOp::TokenDelete { .. });
    if gm_only && !conn.participant.is_gm() {
        return Err(req.error_reply("E_FORBIDDEN", format!("{} is GM-only", op.kind())));
    }

    let is_snapshot = matches!(op, SceneOp::Snapshot { .. });
    let applied = services::scene::apply(state, &conn.room, op)
        .await
        .map_err(|e| req.error_reply(e.error_code(), e.to_string()))?;
    let data = serde_json::to_value(&applied).map_err(|e| req.error_reply("E_CODEC", e.to_string()))?;

    if is_snapshot { Ok(Outcome::Reply(data)) } else { Ok(Outcome::Broadcast(data)) }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(Value::as_str).unwrap_or("-");
        let message = frame.data.get("message").and_then(Value::as_str).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Binary(frames::encode_frame(frame).into())).await
}

async fn send_all(socket: &mut WebSocket, frames: &[Frame]) -> Result<(), axum::Error> {
    for frame in frames {
        send_frame(socket, frame).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
