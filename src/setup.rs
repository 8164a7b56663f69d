//! Decoy placement: clone a real token as `"<name> (Fake)"` where the GM clicks.

#[cfg(test)]
#[path = "setup_test.rs"]
mod setup_test;

use frames::Token;
use tracing::{error, info};
use uuid::Uuid;

use crate::camera::Point;
use crate::consts::DEFAULT_TOKEN_IMAGE;
use crate::error::{Severity, ShellError};
use crate::host::{Host, ScopedListener};
use crate::matching::decoy_name;

/// A token the GM may clone.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoyCandidate {
    pub id: String,
    pub name: String,
    pub image: String,
}

/// Scene tokens that are neither decoys nor player-owned.
#[must_use]
pub fn candidates(tokens: &[Token]) -> Vec<DecoyCandidate> {
    tokens
        .iter()
        .filter(|t| !t.is_fake() && !t.player_owned)
        .map(|t| DecoyCandidate {
            id: t.id.clone(),
            name: t.name.clone(),
            image: t.image.clone().unwrap_or_else(|| DEFAULT_TOKEN_IMAGE.to_owned()),
        })
        .collect()
}

/// Snap a scene point to the top-left corner of its grid cell.
#[must_use]
pub fn snap_to_grid(at: Point, grid: f64) -> Point {
    if grid <= 0.0 || !grid.is_finite() {
        return at;
    }
    Point::new((at.x / grid).floor() * grid, (at.y / grid).floor() * grid)
}

/// Copy of `source` under a fresh id and the decoy name, placed at `at`.
#[must_use]
pub fn decoy_of(source: &Token, at: Point) -> Token {
    Token {
        id: Uuid::new_v4().to_string(),
        name: decoy_name(&source.name),
        x: at.x,
        y: at.y,
        ..source.clone()
    }
}

/// One decoy placement: pick a source, then click the scene.
#[derive(Clone)]
pub struct SetupSession {
    host: Host,
    selected: Option<String>,
}

impl SetupSession {
    #[must_use]
    pub fn new(host: Host) -> Self {
        Self { host, selected: None }
    }

    #[must_use]
    pub fn candidates(&self) -> Vec<DecoyCandidate> {
        candidates(&self.host.scene.tokens())
    }

    pub fn select(&mut self, token_id: &str) {
        self.selected = Some(token_id.to_owned());
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Wait for a click and create the decoy there.
    ///
    /// # Errors
    ///
    /// `NoSelection` without a selected source, `StaleReference` if the
    /// source disappeared, `PlacementCancelled` if the pointer subscription
    /// was torn down, or the host's creation error.
    pub async fn create_fake(&self) -> Result<Token, ShellError> {
        let source_id = self.selected.as_deref().ok_or(ShellError::NoSelection)?;
        if self.host.scene.token(source_id).is_none() {
            return Err(ShellError::StaleReference(source_id.to_owned()));
        }

        self.host
            .notifier
            .notify(Severity::Info, "Shell Game: Click on the scene to place the fake token.");
        let click = ScopedListener::register(self.host.pointer.clone()).next_click().await?;

        let source = self
            .host
            .scene
            .token(source_id)
            .ok_or_else(|| ShellError::StaleReference(source_id.to_owned()))?;
        let decoy = decoy_of(&source, snap_to_grid(click, self.host.scene.grid_size()));

        match self.host.scene.create_token(decoy).await {
            Ok(created) => {
                info!(source = source_id, decoy = %created.id, x = created.x, y = created.y, "setup: decoy placed");
                Ok(created)
            }
            Err(e) => {
                error!(source = source_id, error = %e, "setup: decoy creation failed");
                Err(e)
            }
        }
    }
}
