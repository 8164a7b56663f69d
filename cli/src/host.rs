//! Host capabilities backed by the relay server and the terminal.
//!
//! DESIGN
//! ======
//! [`RoomView`] mirrors the room's participants and tokens from the welcome
//! frame and every inbound scene/session frame. [`WsScene`] writes token
//! changes through the server and applies them locally once acknowledged.
//! [`Terminal`] renders panels and notices as text and turns `click X Y`
//! input into pointer events.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use frames::{Body, Frame, Participant, SceneOp, SessionOp, ShellEvent, Token};
use shell_game::camera::{CameraTarget, Point};
use shell_game::host::{ListenerId, Notifier, PanelHost, PointerEvents, Scene, Session, Targeting, Viewport};
use shell_game::ready::{PanelView, ReadyState};
use shell_game::relay::Relay;
use shell_game::{Severity, ShellClient, ShellError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::CliError;
use crate::link::{Link, Welcome};

// =============================================================================
// ROOM VIEW
// =============================================================================

/// Local mirror of the shared room.
pub struct RoomView {
    me: Participant,
    participants: Mutex<Vec<Participant>>,
    tokens: Mutex<Vec<Token>>,
}

impl RoomView {
    #[must_use]
    pub fn new(welcome: Welcome) -> Self {
        Self { me: welcome.participant, participants: Mutex::new(welcome.participants), tokens: Mutex::new(welcome.tokens) }
    }

    #[must_use]
    pub fn tokens(&self) -> Vec<Token> {
        lock(&self.tokens).clone()
    }

    pub fn apply_scene(&self, op: &SceneOp) {
        let mut tokens = lock(&self.tokens);
        match op {
            SceneOp::TokenCreate { token } => {
                tokens.retain(|t| t.id != token.id);
                tokens.push(token.clone());
            }
            SceneOp::TokenUpdate { id, x, y, elevation, .. } => {
                let Some(token) = tokens.iter_mut().find(|t| t.id == *id) else {
                    debug!(%id, "room: update for unknown token ignored");
                    return;
                };
                if let Some(x) = x {
                    token.x = *x;
                }
                if let Some(y) = y {
                    token.y = *y;
                }
                if let Some(elevation) = elevation {
                    token.elevation = *elevation;
                }
            }
            SceneOp::TokenDelete { id } => tokens.retain(|t| t.id != *id),
            SceneOp::Snapshot { tokens: all } => *tokens = all.clone(),
        }
    }

    pub fn apply_session(&self, op: &SessionOp) {
        let mut participants = lock(&self.participants);
        match op {
            SessionOp::Join { participant } => {
                if let Some(known) = participants.iter_mut().find(|p| p.id == participant.id) {
                    *known = participant.clone();
                } else {
                    participants.push(participant.clone());
                }
            }
            SessionOp::Part { user_id } => {
                for p in participants.iter_mut().filter(|p| p.id == *user_id) {
                    p.active = false;
                }
            }
            SessionOp::Welcome { participants: all, .. } => *participants = all.clone(),
            SessionOp::Error { code, message } => warn!(%code, %message, "room: server error"),
        }
    }
}

impl Session for RoomView {
    fn current_user(&self) -> Participant {
        self.me.clone()
    }

    fn participants(&self) -> Vec<Participant> {
        lock(&self.participants).clone()
    }
}

/// Route inbound frames: shell events to the client, everything else into
/// the room view. Joins and parts also refresh the client's open panel.
pub async fn route_inbound(
    mut inbound: mpsc::Receiver<Frame>,
    view: Arc<RoomView>,
    client: Arc<ShellClient>,
    shell: mpsc::Sender<ShellEvent>,
) {
    while let Some(frame) = inbound.recv().await {
        match frame.body() {
            Ok(Body::Shell(event)) => {
                if shell.send(event).await.is_err() {
                    break;
                }
            }
            Ok(Body::Scene(op)) => view.apply_scene(&op),
            Ok(Body::Session(op)) => {
                view.apply_session(&op);
                if matches!(op, SessionOp::Join { .. } | SessionOp::Part { .. }) {
                    client.roster_changed();
                }
            }
            Err(e) => warn!(syscall = %frame.syscall, error = %e, "room: invalid frame dropped"),
        }
    }
    info!("room: inbound stream closed");
}

// =============================================================================
// SCENE + RELAY
// =============================================================================

pub struct WsScene {
    link: Arc<Link>,
    view: Arc<RoomView>,
    grid: f64,
}

impl WsScene {
    #[must_use]
    pub fn new(link: Arc<Link>, view: Arc<RoomView>, grid: f64) -> Self {
        Self { link, view, grid }
    }

    async fn write(&self, id: &str, op: SceneOp) -> Result<Frame, ShellError> {
        let reply = self.link.request(Frame::scene(&op)).await.map_err(|e| scene_error(id, e))?;
        self.view.apply_scene(&op);
        Ok(reply)
    }
}

fn scene_error(id: &str, error: CliError) -> ShellError {
    if error.server_code() == Some("E_STALE_REFERENCE") {
        ShellError::StaleReference(id.to_owned())
    } else {
        error.into()
    }
}

#[async_trait]
impl Scene for WsScene {
    fn tokens(&self) -> Vec<Token> {
        self.view.tokens()
    }

    fn grid_size(&self) -> f64 {
        self.grid
    }

    async fn move_token(&self, id: &str, dest: Point, duration_ms: u64) -> Result<(), ShellError> {
        let op = SceneOp::TokenUpdate { id: id.to_owned(), x: Some(dest.x), y: Some(dest.y), elevation: None, animate_ms: duration_ms };
        self.write(id, op).await.map(|_| ())
    }

    async fn set_elevation(&self, id: &str, elevation: f64) -> Result<(), ShellError> {
        let op = SceneOp::TokenUpdate { id: id.to_owned(), x: None, y: None, elevation: Some(elevation), animate_ms: 0 };
        self.write(id, op).await.map(|_| ())
    }

    async fn create_token(&self, token: Token) -> Result<Token, ShellError> {
        let id = token.id.clone();
        let reply = self.write(&id, SceneOp::TokenCreate { token }).await?;
        match reply.body().map_err(ShellError::from)? {
            Body::Scene(SceneOp::TokenCreate { token }) => Ok(token),
            _ => Err(ShellError::Host(format!("unexpected reply to token-create: {}", reply.syscall))),
        }
    }
}

pub struct WsRelay {
    link: Arc<Link>,
}

impl WsRelay {
    #[must_use]
    pub fn new(link: Arc<Link>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl Relay for WsRelay {
    async fn broadcast(&self, event: ShellEvent) -> Result<(), ShellError> {
        self.link.send(Frame::shell(&event)).await.map_err(ShellError::from)
    }
}

// =============================================================================
// TERMINAL
// =============================================================================

const SCREEN_W: f64 = 1280.0;
const SCREEN_H: f64 = 720.0;

/// Text front end for panels, notices and pointer input.
#[derive(Default)]
pub struct Terminal {
    listeners: Mutex<HashMap<ListenerId, oneshot::Sender<Point>>>,
    next_id: AtomicU64,
}

impl Terminal {
    /// Deliver a scene click to every waiting listener. Returns how many
    /// listeners received it.
    pub fn click(&self, at: Point) -> usize {
        let waiting: Vec<_> = lock(&self.listeners).drain().map(|(_, tx)| tx).collect();
        waiting.into_iter().map(|tx| tx.send(at)).filter(Result::is_ok).count()
    }
}

#[must_use]
pub fn render_panel(view: &PanelView) -> String {
    let mut out = format!("== Shell Game: {} ==\n", view.token_name);
    if view.rows.is_empty() {
        out.push_str("  (no players)\n");
    }
    for row in &view.rows {
        let state = match row.state {
            ReadyState::Unknown => "?",
            ReadyState::Ready => "ready",
            ReadyState::No => "no",
        };
        let _ = writeln!(out, "  {:<20} {state}", row.name);
    }
    if view.can_respond {
        out.push_str("  > type `ready` or `no`\n");
    }
    if view.can_begin {
        out.push_str("  > everyone is ready; type `begin`\n");
    }
    out
}

impl Notifier for Terminal {
    fn notify(&self, severity: Severity, message: &str) {
        let tag = match severity {
            Severity::Info => "info",
            Severity::Warning => "warn",
            Severity::Error => "error",
        };
        println!("[{tag}] {message}");
    }
}

impl PanelHost for Terminal {
    fn open(&self, view: &PanelView) {
        print!("{}", render_panel(view));
    }

    fn render(&self, view: &PanelView) {
        print!("{}", render_panel(view));
    }

    fn close(&self) {
        println!("== ready check closed ==");
    }

    fn countdown(&self, remaining: u32) {
        if remaining == 0 {
            println!("Shuffle!");
        } else {
            println!("{remaining}...");
        }
    }
}

#[async_trait]
impl Viewport for Terminal {
    fn size(&self) -> (f64, f64) {
        (SCREEN_W, SCREEN_H)
    }

    async fn animate_to(&self, target: CameraTarget) {
        println!(
            "[camera] centre ({:.0}, {:.0}) at {:.2}x over {} ms",
            target.center.x, target.center.y, target.scale, target.duration_ms
        );
    }
}

impl Targeting for Terminal {
    fn clear_targets(&self) {
        debug!("terminal: targets cleared");
    }
}

impl PointerEvents for Terminal {
    fn register(&self, tx: oneshot::Sender<Point>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).insert(id, tx);
        id
    }

    fn unregister(&self, id: ListenerId) {
        lock(&self.listeners).remove(&id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "host_test.rs"]
mod tests;
