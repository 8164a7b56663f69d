//! Readiness Coordinator: a barrier across every connected player.
//!
//! DESIGN
//! ======
//! Each client keeps its own [`ReadyCheck`] and converges through relayed
//! events; there is no central authority. The GM starts a check, players
//! answer, and the GM's begin is accepted only once every tracked player is
//! ready. A new check fully replaces the previous one, so a late answer is
//! recorded against whichever check is open when it arrives. Players who
//! leave after the check opened stop counting toward the barrier; `refresh`
//! re-renders the panel when the roster changes.
//!
//! LIFECYCLE
//! =========
//! 1. `start` (GM) validates the scene, opens the local panel, broadcasts
//!    `start-check`; peers call `open_check`
//! 2. `report_status` (local user) records + broadcasts; peers `apply_status`
//! 3. `begin` (GM) broadcasts `close-check`, `clear-targets`, `countdown`,
//!    then closes the panel; peers `close_check` and arm the token name
//! 4. The countdown handler takes the armed name and runs the shuffle

#[cfg(test)]
#[path = "ready_test.rs"]
mod ready_test;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use frames::{Participant, ReadyAnswer, ShellEvent};
use tracing::{debug, info};

use crate::camera::{Point, frame_points};
use crate::consts::MIN_SHUFFLE_TOKENS;
use crate::error::ShellError;
use crate::host::Host;
use crate::matching::{NameMatch, matching_tokens};
use crate::relay::Relay;
use crate::settings::ShellSettings;

// =============================================================================
// READY BOARD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Unknown,
    Ready,
    No,
}

impl From<ReadyAnswer> for ReadyState {
    fn from(answer: ReadyAnswer) -> Self {
        match answer {
            ReadyAnswer::Ready => Self::Ready,
            ReadyAnswer::No => Self::No,
        }
    }
}

/// Participant id to ready state, for the tracked participants only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadyBoard {
    states: BTreeMap<String, ReadyState>,
}

impl ReadyBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over: every active non-GM participant becomes `Unknown` and
    /// everyone else is dropped.
    pub fn reset(&mut self, participants: &[Participant]) {
        self.states = participants
            .iter()
            .filter(|p| p.active && !p.is_gm())
            .map(|p| (p.id.clone(), ReadyState::Unknown))
            .collect();
    }

    /// Record an answer. Returns `false` if `user_id` is not tracked.
    pub fn record(&mut self, user_id: &str, answer: ReadyAnswer) -> bool {
        match self.states.get_mut(user_id) {
            Some(state) => {
                *state = answer.into();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn state_of(&self, user_id: &str) -> Option<ReadyState> {
        self.states.get(user_id).copied()
    }

    /// Non-empty and every tracked participant is ready.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        !self.states.is_empty() && self.states.values().all(|s| *s == ReadyState::Ready)
    }

    /// Like [`is_satisfied`](Self::is_satisfied), counting only tracked
    /// participants who are still active in `participants`.
    #[must_use]
    pub fn is_satisfied_among(&self, participants: &[Participant]) -> bool {
        let present: Vec<ReadyState> = self
            .iter()
            .filter(|(id, _)| is_present(participants, id))
            .map(|(_, state)| state)
            .collect();
        !present.is_empty() && present.iter().all(|s| *s == ReadyState::Ready)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ReadyState)> {
        self.states.iter().map(|(id, s)| (id.as_str(), *s))
    }
}

fn is_present(participants: &[Participant], id: &str) -> bool {
    participants.iter().any(|p| p.id == id && p.active)
}

// =============================================================================
// PANEL VIEW
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub user_id: String,
    pub name: String,
    pub state: ReadyState,
}

/// Plain data handed to the host's panel renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub token_name: String,
    pub rows: Vec<PanelRow>,
    /// The viewer can answer ready/no (players only).
    pub can_respond: bool,
    /// The viewer can begin the shuffle (GM, barrier satisfied).
    pub can_begin: bool,
}

// =============================================================================
// READY CHECK
// =============================================================================

/// One open ready check.
#[derive(Debug, Clone)]
pub struct ReadyCheck {
    pub token_name: String,
    pub board: ReadyBoard,
}

impl ReadyCheck {
    #[must_use]
    pub fn open(token_name: &str, participants: &[Participant]) -> Self {
        let mut board = ReadyBoard::new();
        board.reset(participants);
        Self { token_name: token_name.to_owned(), board }
    }

    /// Rows cover tracked participants who are still active; someone who
    /// left mid-check drops out of the barrier until they return.
    #[must_use]
    pub fn view(&self, participants: &[Participant], viewer: &Participant) -> PanelView {
        let rows = self
            .board
            .iter()
            .filter(|(id, _)| is_present(participants, id))
            .map(|(id, state)| PanelRow {
                user_id: id.to_owned(),
                name: participants
                    .iter()
                    .find(|p| p.id == id)
                    .map_or_else(|| id.to_owned(), |p| p.name.clone()),
                state,
            })
            .collect();
        PanelView {
            token_name: self.token_name.clone(),
            rows,
            can_respond: !viewer.is_gm(),
            can_begin: viewer.is_gm() && self.board.is_satisfied_among(participants),
        }
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct Coordinator {
    host: Host,
    relay: Arc<dyn Relay>,
    check: Mutex<Option<ReadyCheck>>,
    armed: Mutex<Option<String>>,
}

impl Coordinator {
    #[must_use]
    pub fn new(host: Host, relay: Arc<dyn Relay>) -> Self {
        Self { host, relay, check: Mutex::new(None), armed: Mutex::new(None) }
    }

    /// GM: validate the scene and open a check on every client.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-GM callers, `NotEnoughTokens` if fewer than two
    /// tokens match `token_name`, `Relay` if the broadcast fails.
    pub async fn start(&self, token_name: &str) -> Result<(), ShellError> {
        if !self.host.is_gm() {
            return Err(ShellError::Forbidden { action: "start a shell game" });
        }
        let settings = ShellSettings::load(self.host.settings.as_ref());
        let found = matching_tokens(&self.host.scene.tokens(), token_name, settings.name_match).len();
        if found < MIN_SHUFFLE_TOKENS {
            return Err(ShellError::NotEnoughTokens { name: token_name.to_owned(), found });
        }

        self.open_check(token_name);
        self.relay
            .broadcast(ShellEvent::StartCheck { token_name: token_name.to_owned() })
            .await?;
        info!(token_name, found, "ready: check started");
        Ok(())
    }

    /// Replace any open check with a fresh one and open the local panel.
    pub fn open_check(&self, token_name: &str) {
        let participants = self.host.session.participants();
        let check = ReadyCheck::open(token_name, &participants);
        let view = check.view(&participants, &self.host.current_user());
        debug!(token_name, tracked = check.board.len(), "ready: check opened");
        *lock(&self.check) = Some(check);
        *lock(&self.armed) = None;
        self.host.panels.open(&view);
    }

    /// The local user answers the open check.
    ///
    /// # Errors
    ///
    /// `PlayersOnly` for the GM, `NoActiveCheck` if no check is open,
    /// `Relay` if the broadcast fails.
    pub async fn report_status(&self, answer: ReadyAnswer) -> Result<(), ShellError> {
        let me = self.host.current_user();
        if me.is_gm() {
            return Err(ShellError::PlayersOnly);
        }
        let token_name = self.active_token_name().ok_or(ShellError::NoActiveCheck)?;

        if answer == ReadyAnswer::Ready {
            self.host.targeting.clear_targets();
        }
        self.apply_status(&me.id, answer);
        self.relay
            .broadcast(ShellEvent::Status { user_id: me.id.clone(), status: answer })
            .await?;

        if answer == ReadyAnswer::Ready {
            let settings = ShellSettings::load(self.host.settings.as_ref());
            if settings.force_zoom {
                self.frame_tokens(&token_name, settings.name_match).await;
            }
        }
        Ok(())
    }

    /// Merge a status change (local or relayed) and re-render the panel.
    /// Returns `false` when there is no open check or the id is untracked.
    pub fn apply_status(&self, user_id: &str, answer: ReadyAnswer) -> bool {
        let participants = self.host.session.participants();
        let viewer = self.host.current_user();
        let view = {
            let mut guard = lock(&self.check);
            let Some(check) = guard.as_mut() else {
                debug!(user_id, "ready: status with no open check ignored");
                return false;
            };
            if !check.board.record(user_id, answer) {
                debug!(user_id, "ready: status for untracked participant ignored");
                return false;
            }
            check.view(&participants, &viewer)
        };
        self.host.panels.render(&view);
        true
    }

    /// Re-render the open panel after the roster changed.
    pub fn refresh(&self) {
        let participants = self.host.session.participants();
        let view = lock(&self.check)
            .as_ref()
            .map(|check| check.view(&participants, &self.host.current_user()));
        if let Some(view) = view {
            debug!(can_begin = view.can_begin, "ready: roster changed");
            self.host.panels.render(&view);
        }
    }

    /// Every tracked player who is still in the room is ready.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        let participants = self.host.session.participants();
        lock(&self.check).as_ref().is_some_and(|c| c.board.is_satisfied_among(&participants))
    }

    /// Snapshot of the open check, if any.
    #[must_use]
    pub fn current(&self) -> Option<ReadyCheck> {
        lock(&self.check).clone()
    }

    #[must_use]
    pub fn active_token_name(&self) -> Option<String> {
        lock(&self.check).as_ref().map(|c| c.token_name.clone())
    }

    /// GM: close the barrier and release every client. Returns the token
    /// name to shuffle locally.
    ///
    /// The check stays open until every release event went out, so a relay
    /// failure leaves the GM free to retry.
    ///
    /// # Errors
    ///
    /// `Forbidden` for non-GM callers, `NoActiveCheck` / `NotReady` when the
    /// barrier cannot be released (no state changes), `Relay` on broadcast
    /// failure.
    pub async fn begin(&self) -> Result<String, ShellError> {
        if !self.host.is_gm() {
            return Err(ShellError::Forbidden { action: "begin the shell game" });
        }
        let participants = self.host.session.participants();
        let token_name = match lock(&self.check).as_ref() {
            None => return Err(ShellError::NoActiveCheck),
            Some(check) if !check.board.is_satisfied_among(&participants) => return Err(ShellError::NotReady),
            Some(check) => check.token_name.clone(),
        };

        for event in [ShellEvent::CloseCheck, ShellEvent::ClearTargets, ShellEvent::Countdown] {
            self.relay.broadcast(event).await?;
        }

        lock(&self.check).take();
        self.host.panels.close();
        info!(token_name, "ready: barrier released");
        Ok(token_name)
    }

    /// Peer side of `close-check`: close the panel and arm the token name
    /// for the coming countdown.
    pub fn close_check(&self) {
        let closed = lock(&self.check).take();
        if let Some(check) = closed {
            debug!(token_name = %check.token_name, "ready: check closed");
            *lock(&self.armed) = Some(check.token_name);
        }
        self.host.panels.close();
    }

    /// Token name armed by the last `close-check`, consumed once.
    pub fn take_armed(&self) -> Option<String> {
        lock(&self.armed).take()
    }

    async fn frame_tokens(&self, token_name: &str, mode: NameMatch) {
        let centers: Vec<Point> = matching_tokens(&self.host.scene.tokens(), token_name, mode)
            .iter()
            .map(|t| {
                let (x, y) = t.center();
                Point::new(x, y)
            })
            .collect();
        let (width, height) = self.host.viewport.size();
        if let Some(target) = frame_points(&centers, width, height) {
            debug!(scale = target.scale, "ready: framing tokens");
            self.host.viewport.animate_to(target).await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
