//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds a map of live rooms. Each room owns the authoritative token
//! documents for its scene and the outbound queue of every connected client.
//! Nothing is persisted; a room lives as long as it has clients or tokens.

use std::collections::HashMap;
use std::sync::Arc;

use frames::{Frame, Participant, Token};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;

// =============================================================================
// ROOM STATE
// =============================================================================

/// One connected client.
pub struct ClientEntry {
    pub participant: Participant,
    pub tx: mpsc::Sender<Frame>,
}

/// Per-room live state.
#[derive(Default)]
pub struct RoomState {
    /// Connected clients: `client_id` -> participant and outbound queue.
    pub clients: HashMap<Uuid, ClientEntry>,
    /// Token documents in scene order.
    pub tokens: Vec<Token>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, RoomState>>>,
    pub config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), config }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
