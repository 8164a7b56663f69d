//! Scene service — authoritative token documents.
//!
//! DESIGN
//! ======
//! Token changes are applied to the room's in-memory document list and the
//! applied op is returned for broadcast. Updates are partial: absent fields
//! keep their current value.

use frames::{SceneOp, Token};
use tracing::debug;

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("token not found: {0}")]
    NotFound(String),
    #[error("token already exists: {0}")]
    Duplicate(String),
}

impl SceneError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_STALE_REFERENCE",
            Self::Duplicate(_) => "E_CONFLICT",
        }
    }
}

/// Apply `op` to `tokens`. Returns the op peers should see; a snapshot
/// request comes back filled with the current tokens.
///
/// # Errors
///
/// `NotFound` for updates or deletes of unknown tokens, `Duplicate` when
/// creating an id that already exists.
pub fn apply_op(tokens: &mut Vec<Token>, op: SceneOp) -> Result<SceneOp, SceneError> {
    match op {
        SceneOp::TokenCreate { token } => {
            if tokens.iter().any(|t| t.id == token.id) {
                return Err(SceneError::Duplicate(token.id));
            }
            tokens.push(token.clone());
            Ok(SceneOp::TokenCreate { token })
        }
        SceneOp::TokenUpdate { id, x, y, elevation, animate_ms } => {
            let token = tokens
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| SceneError::NotFound(id.clone()))?;
            if let Some(x) = x {
                token.x = x;
            }
            if let Some(y) = y {
                token.y = y;
            }
            if let Some(elevation) = elevation {
                token.elevation = elevation;
            }
            Ok(SceneOp::TokenUpdate { id, x, y, elevation, animate_ms })
        }
        SceneOp::TokenDelete { id } => {
            let before = tokens.len();
            tokens.retain(|t| t.id != id);
            if tokens.len() == before {
                return Err(SceneError::NotFound(id));
            }
            Ok(SceneOp::TokenDelete { id })
        }
        SceneOp::Snapshot { .. } => Ok(SceneOp::Snapshot { tokens: tokens.clone() }),
    }
}

/// Apply `op` to the room's scene, creating the room if needed.
///
/// # Errors
///
/// See [`apply_op`].
pub async fn apply(state: &AppState, room: &str, op: SceneOp) -> Result<SceneOp, SceneError> {
    let mut rooms = state.rooms.write().await;
    let room_state = rooms.entry(room.to_owned()).or_default();
    let kind = op.kind();
    let applied = apply_op(&mut room_state.tokens, op)?;
    debug!(room, kind, tokens = room_state.tokens.len(), "scene op applied");
    Ok(applied)
}

#[cfg(test)]
#[path = "scene_test.rs"]
mod tests;
