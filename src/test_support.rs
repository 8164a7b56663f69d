//! In-memory host and relay doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use frames::{Participant, Role, ShellEvent, Token};
use tokio::sync::oneshot;

use crate::camera::{CameraTarget, Point};
use crate::error::{Severity, ShellError};
use crate::host::{Host, ListenerId, Notifier, PanelHost, PointerEvents, Scene, Session, Targeting, Viewport};
use crate::ready::PanelView;
use crate::relay::Relay;
use crate::settings::MapSettings;

// =============================================================================
// FIXTURES
// =============================================================================

pub fn gm(id: &str) -> Participant {
    Participant { id: id.to_owned(), name: format!("GM {id}"), role: Role::Gm, active: true }
}

pub fn player(id: &str) -> Participant {
    Participant { id: id.to_owned(), name: format!("Player {id}"), role: Role::Player, active: true }
}

pub fn token(id: &str, name: &str, x: f64, y: f64) -> Token {
    Token {
        id: id.to_owned(),
        name: name.to_owned(),
        x,
        y,
        elevation: 0.0,
        width: 100.0,
        height: 100.0,
        image: None,
        player_owned: false,
    }
}

pub fn rats(n: usize) -> Vec<Token> {
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let x = 200.0 * i as f64;
            token(&format!("rat{i}"), "Rat", x, 100.0)
        })
        .collect()
}

pub type Roster = Arc<Mutex<Vec<Participant>>>;

pub fn roster(people: &[Participant]) -> Roster {
    Arc::new(Mutex::new(people.to_vec()))
}

/// Host backed by `scene` as seen by `user`. Settings default to a short
/// runtime so shuffles finish quickly under paused time.
pub fn host_for(user: &Participant, roster: &Roster, scene: &Arc<MockScene>, settings: MapSettings) -> (Host, Arc<MockClient>) {
    let client = Arc::new(MockClient::new(user.clone(), roster.clone()));
    let host = Host {
        scene: scene.clone(),
        session: client.clone(),
        notifier: client.clone(),
        panels: client.clone(),
        viewport: client.clone(),
        targeting: client.clone(),
        pointer: client.clone(),
        settings: Arc::new(settings),
        scheduler: None,
    };
    (host, client)
}

// =============================================================================
// SCENE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MoveCall {
    pub id: String,
    pub dest: Point,
    pub duration_ms: u64,
}

pub struct MockScene {
    tokens: Mutex<Vec<Token>>,
    moves: Mutex<Vec<MoveCall>>,
    elevations: Mutex<Vec<(String, f64)>>,
    grid: f64,
    fail_create: AtomicBool,
}

impl MockScene {
    pub fn new(tokens: Vec<Token>) -> Arc<Self> {
        Arc::new(Self {
            tokens: Mutex::new(tokens),
            moves: Mutex::new(Vec::new()),
            elevations: Mutex::new(Vec::new()),
            grid: 100.0,
            fail_create: AtomicBool::new(false),
        })
    }

    pub fn remove(&self, id: &str) {
        self.tokens.lock().unwrap().retain(|t| t.id != id);
    }

    pub fn fail_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn move_calls(&self) -> Vec<MoveCall> {
        self.moves.lock().unwrap().clone()
    }

    pub fn elevation_calls(&self) -> Vec<(String, f64)> {
        self.elevations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scene for MockScene {
    fn tokens(&self) -> Vec<Token> {
        self.tokens.lock().unwrap().clone()
    }

    fn grid_size(&self) -> f64 {
        self.grid
    }

    async fn move_token(&self, id: &str, dest: Point, duration_ms: u64) -> Result<(), ShellError> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ShellError::StaleReference(id.to_owned()))?;
        token.x = dest.x;
        token.y = dest.y;
        self.moves.lock().unwrap().push(MoveCall { id: id.to_owned(), dest, duration_ms });
        Ok(())
    }

    async fn set_elevation(&self, id: &str, elevation: f64) -> Result<(), ShellError> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ShellError::StaleReference(id.to_owned()))?;
        token.elevation = elevation;
        self.elevations.lock().unwrap().push((id.to_owned(), elevation));
        Ok(())
    }

    async fn create_token(&self, token: Token) -> Result<Token, ShellError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ShellError::Host("scene rejected the token".into()));
        }
        self.tokens.lock().unwrap().push(token.clone());
        Ok(token)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    Open(PanelView),
    Render(PanelView),
    Close,
    Countdown(u32),
}

/// Everything one client's UI would show, recorded for assertions.
pub struct MockClient {
    user: Participant,
    roster: Roster,
    notes: Mutex<Vec<(Severity, String)>>,
    panel: Mutex<Vec<PanelEvent>>,
    camera: Mutex<Vec<CameraTarget>>,
    target_clears: AtomicUsize,
    listeners: Mutex<HashMap<ListenerId, oneshot::Sender<Point>>>,
    next_listener: AtomicU64,
}

impl MockClient {
    pub fn new(user: Participant, roster: Roster) -> Self {
        Self {
            user,
            roster,
            notes: Mutex::new(Vec::new()),
            panel: Mutex::new(Vec::new()),
            camera: Mutex::new(Vec::new()),
            target_clears: AtomicUsize::new(0),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn notes(&self) -> Vec<(Severity, String)> {
        self.notes.lock().unwrap().clone()
    }

    pub fn panel_events(&self) -> Vec<PanelEvent> {
        self.panel.lock().unwrap().clone()
    }

    /// The most recent opened or rendered view.
    pub fn last_view(&self) -> Option<PanelView> {
        self.panel.lock().unwrap().iter().rev().find_map(|e| match e {
            PanelEvent::Open(v) | PanelEvent::Render(v) => Some(v.clone()),
            _ => None,
        })
    }

    pub fn camera_targets(&self) -> Vec<CameraTarget> {
        self.camera.lock().unwrap().clone()
    }

    pub fn target_clears(&self) -> usize {
        self.target_clears.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Deliver a click to every registered listener.
    pub fn click(&self, at: Point) -> usize {
        let listeners: Vec<_> = self.listeners.lock().unwrap().drain().collect();
        let delivered = listeners.len();
        for (_, tx) in listeners {
            let _ = tx.send(at);
        }
        delivered
    }
}

impl Session for MockClient {
    fn current_user(&self) -> Participant {
        self.user.clone()
    }

    fn participants(&self) -> Vec<Participant> {
        self.roster.lock().unwrap().clone()
    }
}

impl Notifier for MockClient {
    fn notify(&self, severity: Severity, message: &str) {
        self.notes.lock().unwrap().push((severity, message.to_owned()));
    }
}

impl PanelHost for MockClient {
    fn open(&self, view: &PanelView) {
        self.panel.lock().unwrap().push(PanelEvent::Open(view.clone()));
    }

    fn render(&self, view: &PanelView) {
        self.panel.lock().unwrap().push(PanelEvent::Render(view.clone()));
    }

    fn close(&self) {
        self.panel.lock().unwrap().push(PanelEvent::Close);
    }

    fn countdown(&self, remaining: u32) {
        self.panel.lock().unwrap().push(PanelEvent::Countdown(remaining));
    }
}

#[async_trait]
impl Viewport for MockClient {
    fn size(&self) -> (f64, f64) {
        (1200.0, 800.0)
    }

    async fn animate_to(&self, target: CameraTarget) {
        self.camera.lock().unwrap().push(target);
    }
}

impl Targeting for MockClient {
    fn clear_targets(&self) {
        self.target_clears.fetch_add(1, Ordering::SeqCst);
    }
}

impl PointerEvents for MockClient {
    fn register(&self, tx: oneshot::Sender<Point>) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().insert(id, tx);
        id
    }

    fn unregister(&self, id: ListenerId) {
        self.listeners.lock().unwrap().remove(&id);
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Relay that records outgoing events instead of delivering them.
#[derive(Default)]
pub struct RecordingRelay {
    sent: Mutex<Vec<ShellEvent>>,
    /// Sends left before every further send fails; `None` never fails.
    budget: Mutex<Option<usize>>,
}

impl RecordingRelay {
    pub fn sent(&self) -> Vec<ShellEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self) {
        self.fail_after(0);
    }

    pub fn fail_after(&self, sends: usize) {
        *self.budget.lock().unwrap() = Some(sends);
    }

    pub fn resume_sends(&self) {
        *self.budget.lock().unwrap() = None;
    }
}

#[async_trait]
impl Relay for RecordingRelay {
    async fn broadcast(&self, event: ShellEvent) -> Result<(), ShellError> {
        {
            let mut budget = self.budget.lock().unwrap();
            match budget.as_mut() {
                Some(0) => return Err(ShellError::Relay("socket closed".into())),
                Some(left) => *left -= 1,
                None => {}
            }
        }
        self.sent.lock().unwrap().push(event);
        Ok(())
    }
}
