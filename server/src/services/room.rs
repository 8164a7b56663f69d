//! Room service — presence and fan-out.
//!
//! DESIGN
//! ======
//! A room is created on first join. Each client registers a bounded outbound
//! queue; `broadcast` clones the frame into every queue with `try_send`, so
//! a slow client loses frames instead of stalling the room. Per-sender
//! order is preserved because each queue is FIFO.

use frames::{Frame, Participant, Token};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{AppState, ClientEntry};

/// Register a client and return the room's participants and tokens.
pub async fn join_room(
    state: &AppState,
    room: &str,
    client_id: Uuid,
    participant: Participant,
    tx: mpsc::Sender<Frame>,
) -> (Vec<Participant>, Vec<Token>) {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.entry(room.to_owned()).or_default();
    info!(room, %client_id, user_id = %participant.id, role = ?participant.role, "client joined room");
    room_state.clients.insert(client_id, ClientEntry { participant, tx });
    (unique_participants(room_state.clients.values().map(|c| &c.participant)), room_state.tokens.clone())
}

/// Remove a client. Returns its participant if the user has no other
/// connection left in the room. Empty rooms without tokens are evicted.
pub async fn part_room(state: &AppState, room: &str, client_id: Uuid) -> Option<Participant> {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.get_mut(room)?;
    let entry = room_state.clients.remove(&client_id)?;
    info!(room, %client_id, remaining = room_state.clients.len(), "client left room");

    let still_connected = room_state
        .clients
        .values()
        .any(|c| c.participant.id == entry.participant.id);

    if room_state.clients.is_empty() && room_state.tokens.is_empty() {
        rooms.remove(room);
        info!(room, "evicted empty room");
    }
    (!still_connected).then_some(entry.participant)
}

/// Deliver `frame` to every client in `room` except `exclude`.
pub async fn broadcast(state: &AppState, room: &str, frame: &Frame, exclude: Option<Uuid>) {
    let rooms = state.rooms.read().await;
    let Some(room_state) = rooms.get(room) else {
        return;
    };

    for (client_id, client) in &room_state.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        if let Err(e) = client.tx.try_send(frame.clone()) {
            debug!(room, %client_id, error = %e, syscall = %frame.syscall, "dropped frame for client");
        }
    }
}

fn unique_participants<'a>(all: impl Iterator<Item = &'a Participant>) -> Vec<Participant> {
    let mut out: Vec<Participant> = Vec::new();
    for p in all {
        if !out.iter().any(|seen| seen.id == p.id) {
            out.push(p.clone());
        }
    }
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
