//! Per-client entry point wiring chat commands and relayed events to the
//! coordinator, the shuffle engine and decoy setup.
//!
//! DESIGN
//! ======
//! A [`ShellClient`] owns one [`Coordinator`] and one [`ShuffleEngine`].
//! Local actions (chat, panel buttons, setup) come in through its methods;
//! relayed [`ShellEvent`]s come in through [`ShellClient::handle_event`],
//! usually fed by [`pump`]. Errors never propagate out: they are shown to
//! the local user through the host's notifier.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use frames::{ReadyAnswer, ShellEvent, Token};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::{self, ChatCommand};
use crate::consts::{COUNTDOWN_FROM, COUNTDOWN_STEP_MS};
use crate::error::{Severity, ShellError};
use crate::host::Host;
use crate::ready::Coordinator;
use crate::relay::Relay;
use crate::settings::ShellSettings;
use crate::setup::{DecoyCandidate, SetupSession};
use crate::shuffle::{ShuffleEngine, ShuffleReport};
use crate::wait::Waiter;

/// Whether a chat message was taken over by the shell game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Not a `/shell` command; post it as ordinary chat.
    Passthrough,
    /// Handled (successfully or not); do not post it.
    Consumed,
}

pub struct ShellClient {
    host: Host,
    coordinator: Coordinator,
    engine: ShuffleEngine,
    setup: Mutex<Option<SetupSession>>,
    last_report: Mutex<Option<ShuffleReport>>,
}

impl ShellClient {
    #[must_use]
    pub fn new(host: Host, relay: Arc<dyn Relay>) -> Self {
        let engine = ShuffleEngine::new(host.scene.clone(), Waiter::new(host.scheduler.clone()));
        Self { coordinator: Coordinator::new(host.clone(), relay), engine, host, setup: Mutex::new(None), last_report: Mutex::new(None) }
    }

    /// Fix the shuffle's random seed.
    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.engine = self.engine.with_seed(seed);
        self
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    #[must_use]
    pub fn engine(&self) -> &ShuffleEngine {
        &self.engine
    }

    /// Outcome of the most recent local shuffle.
    #[must_use]
    pub fn last_report(&self) -> Option<ShuffleReport> {
        lock(&self.last_report).clone()
    }

    // =========================================================================
    // LOCAL ACTIONS
    // =========================================================================

    /// Intercept `/shell` chat commands.
    pub async fn handle_chat(&self, content: &str) -> ChatOutcome {
        let Some(parsed) = command::parse(content) else {
            return ChatOutcome::Passthrough;
        };
        if let Err(e) = self.run_command(parsed).await {
            self.host.report(&e);
        }
        ChatOutcome::Consumed
    }

    async fn run_command(&self, parsed: Result<ChatCommand, ShellError>) -> Result<(), ShellError> {
        if !self.host.is_gm() {
            return Err(ShellError::Forbidden { action: "use /shell" });
        }
        match parsed? {
            ChatCommand::StartCheck(name) => self.coordinator.start(&name).await,
            ChatCommand::Setup => {
                self.open_setup();
                Ok(())
            }
        }
    }

    /// Open (or restart) the decoy tool and list the candidates.
    pub fn open_setup(&self) -> Vec<DecoyCandidate> {
        let session = SetupSession::new(self.host.clone());
        let found = session.candidates();
        *lock(&self.setup) = Some(session);
        debug!(candidates = found.len(), "setup: opened");
        found
    }

    /// Candidates of the open decoy tool, if any.
    #[must_use]
    pub fn setup_candidates(&self) -> Option<Vec<DecoyCandidate>> {
        lock(&self.setup).as_ref().map(SetupSession::candidates)
    }

    /// # Errors
    ///
    /// `NoSelection` if the decoy tool is not open, `StaleReference` if the
    /// token is not a valid candidate.
    pub fn select_decoy_source(&self, token_id: &str) -> Result<(), ShellError> {
        let mut guard = lock(&self.setup);
        let session = guard.as_mut().ok_or(ShellError::NoSelection)?;
        if !session.candidates().iter().any(|c| c.id == token_id) {
            return Err(ShellError::StaleReference(token_id.to_owned()));
        }
        session.select(token_id);
        Ok(())
    }

    /// Wait for a scene click and place the decoy. Errors are also reported
    /// to the local user.
    ///
    /// # Errors
    ///
    /// See [`SetupSession::create_fake`].
    pub async fn place_decoy(&self) -> Result<Token, ShellError> {
        let session = lock(&self.setup).clone().ok_or(ShellError::NoSelection)?;
        let placed = session.create_fake().await;
        match &placed {
            Ok(token) => self
                .host
                .notifier
                .notify(Severity::Info, &format!("Shell Game: placed {}.", token.name)),
            Err(e) => self.host.report(e),
        }
        placed
    }

    pub async fn mark_ready(&self) {
        self.answer(ReadyAnswer::Ready).await;
    }

    pub async fn mark_no(&self) {
        self.answer(ReadyAnswer::No).await;
    }

    async fn answer(&self, answer: ReadyAnswer) {
        if let Err(e) = self.coordinator.report_status(answer).await {
            self.host.report(&e);
        }
    }

    /// GM: release the barrier, then count down and shuffle locally.
    pub async fn begin(&self) {
        match self.coordinator.begin().await {
            Ok(token_name) => self.countdown_then_shuffle(&token_name).await,
            Err(e) => self.host.report(&e),
        }
    }

    // =========================================================================
    // RELAYED EVENTS
    // =========================================================================

    pub async fn handle_event(&self, event: ShellEvent) {
        debug!(kind = event.kind(), "shell: event received");
        match event {
            ShellEvent::StartCheck { token_name } => self.coordinator.open_check(&token_name),
            ShellEvent::Status { user_id, status } => {
                self.coordinator.apply_status(&user_id, status);
            }
            ShellEvent::CloseCheck => self.coordinator.close_check(),
            ShellEvent::ClearTargets => self.host.targeting.clear_targets(),
            ShellEvent::Countdown => match self.coordinator.take_armed() {
                Some(token_name) => self.countdown_then_shuffle(&token_name).await,
                None => warn!("shell: countdown without a closed check ignored"),
            },
        }
    }

    /// A participant joined or left; the open panel follows the roster.
    pub fn roster_changed(&self) {
        self.coordinator.refresh();
    }

    // =========================================================================
    // COUNTDOWN + SHUFFLE
    // =========================================================================

    /// 3-2-1 on the panel, one second per step, then `0` when done.
    pub async fn run_countdown(&self) {
        for remaining in (1..=COUNTDOWN_FROM).rev() {
            self.host.panels.countdown(remaining);
            tokio::time::sleep(Duration::from_millis(COUNTDOWN_STEP_MS)).await;
        }
        self.host.panels.countdown(0);
    }

    async fn countdown_then_shuffle(&self, token_name: &str) {
        self.run_countdown().await;
        let settings = ShellSettings::load(self.host.settings.as_ref());
        match self.engine.run(token_name, &settings).await {
            Ok(report) => *lock(&self.last_report) = Some(report),
            Err(e) => self.host.report(&e),
        }
    }
}

/// Feed relayed events into `client` until the stream closes.
pub async fn pump(client: Arc<ShellClient>, mut events: mpsc::Receiver<ShellEvent>) {
    while let Some(event) = events.recv().await {
        client.handle_event(event).await;
    }
    info!("shell: event stream closed");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
