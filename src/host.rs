//! Host capabilities consumed by the core.
//!
//! DESIGN
//! ======
//! The virtual tabletop is an external collaborator. Each capability the
//! core needs is a small trait so tests can mock it and the CLI can back it
//! with the relay server. [`Host`] bundles them the way shared application
//! state is bundled: cheap to clone, every field `Arc`-wrapped.

use std::sync::Arc;

use async_trait::async_trait;
use frames::{Participant, Token};
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::camera::{CameraTarget, Point};
use crate::error::{Severity, ShellError};
use crate::ready::PanelView;
use crate::settings::SettingsStore;
use crate::wait::ExternalScheduler;

// =============================================================================
// CAPABILITIES
// =============================================================================

/// The active scene's token documents.
#[async_trait]
pub trait Scene: Send + Sync {
    /// All tokens currently placed on the scene, in scene order.
    fn tokens(&self) -> Vec<Token>;

    fn token(&self, id: &str) -> Option<Token> {
        self.tokens().into_iter().find(|t| t.id == id)
    }

    /// Grid cell size in scene pixels. Zero disables snapping.
    fn grid_size(&self) -> f64;

    /// Move a token to `dest` (top-left), animated over `duration_ms`.
    /// Resolves once the host has accepted the update.
    async fn move_token(&self, id: &str, dest: Point, duration_ms: u64) -> Result<(), ShellError>;

    async fn set_elevation(&self, id: &str, elevation: f64) -> Result<(), ShellError>;

    /// Persist a new token and return it as stored.
    async fn create_token(&self, token: Token) -> Result<Token, ShellError>;
}

/// The host's session system. Read-only from the core's point of view.
pub trait Session: Send + Sync {
    fn current_user(&self) -> Participant;
    fn participants(&self) -> Vec<Participant>;
}

/// Transient user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Hosts the ready-check panel. The core hands over plain view data.
pub trait PanelHost: Send + Sync {
    fn open(&self, view: &PanelView);
    fn render(&self, view: &PanelView);
    fn close(&self);
    /// Show one countdown step; `0` means the countdown finished.
    fn countdown(&self, remaining: u32);
}

#[async_trait]
pub trait Viewport: Send + Sync {
    /// Screen size in pixels.
    fn size(&self) -> (f64, f64);
    async fn animate_to(&self, target: CameraTarget);
}

pub trait Targeting: Send + Sync {
    fn clear_targets(&self);
}

pub type ListenerId = u64;

/// Pointer-down subscriptions on the scene.
pub trait PointerEvents: Send + Sync {
    /// Register a listener that receives the next click in scene coordinates.
    fn register(&self, tx: oneshot::Sender<Point>) -> ListenerId;
    fn unregister(&self, id: ListenerId);
}

// =============================================================================
// HOST BUNDLE
// =============================================================================

#[derive(Clone)]
pub struct Host {
    pub scene: Arc<dyn Scene>,
    pub session: Arc<dyn Session>,
    pub notifier: Arc<dyn Notifier>,
    pub panels: Arc<dyn PanelHost>,
    pub viewport: Arc<dyn Viewport>,
    pub targeting: Arc<dyn Targeting>,
    pub pointer: Arc<dyn PointerEvents>,
    pub settings: Arc<dyn SettingsStore>,
    /// Optional companion animation scheduler; see [`crate::wait::Waiter`].
    pub scheduler: Option<Arc<dyn ExternalScheduler>>,
}

impl Host {
    #[must_use]
    pub fn current_user(&self) -> Participant {
        self.session.current_user()
    }

    #[must_use]
    pub fn is_gm(&self) -> bool {
        self.session.current_user().is_gm()
    }

    /// Show an error to the local user only.
    pub fn report(&self, err: &ShellError) {
        let severity = err.severity();
        match severity {
            Severity::Error => error!(code = err.error_code(), error = %err, "shell: action failed"),
            _ => warn!(code = err.error_code(), error = %err, "shell: action rejected"),
        }
        self.notifier.notify(severity, &err.to_string());
    }
}

// =============================================================================
// SCOPED LISTENER
// =============================================================================

/// One-shot pointer subscription. Registered on creation and unregistered
/// when dropped, whether or not a click arrived.
pub struct ScopedListener {
    pointer: Arc<dyn PointerEvents>,
    id: ListenerId,
    rx: Option<oneshot::Receiver<Point>>,
}

impl ScopedListener {
    #[must_use]
    pub fn register(pointer: Arc<dyn PointerEvents>) -> Self {
        let (tx, rx) = oneshot::channel();
        let id = pointer.register(tx);
        Self { pointer, id, rx: Some(rx) }
    }

    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the first click, then tear the listener down.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::PlacementCancelled`] if the host dropped the
    /// listener without delivering a click.
    pub async fn next_click(mut self) -> Result<Point, ShellError> {
        let rx = self.rx.take().ok_or(ShellError::PlacementCancelled)?;
        rx.await.map_err(|_| ShellError::PlacementCancelled)
    }
}

impl Drop for ScopedListener {
    fn drop(&mut self) {
        self.pointer.unregister(self.id);
    }
}
