//! Shared numeric constants for the shell game.

// ── Matching ────────────────────────────────────────────────────

pub use frames::FAKE_SUFFIX;

/// Minimum number of matching tokens a shuffle needs.
pub const MIN_SHUFFLE_TOKENS: usize = 2;

// ── Settings ────────────────────────────────────────────────────

pub const DEFAULT_RUNTIME_MS: u64 = 8000;
pub const MIN_RUNTIME_MS: u64 = 1000;
pub const MAX_RUNTIME_MS: u64 = 60_000;

pub const DEFAULT_MOVE_MS: u64 = 350;
pub const MIN_MOVE_MS: u64 = 50;
pub const MAX_MOVE_MS: u64 = 2500;

// ── Shuffle ─────────────────────────────────────────────────────

/// Upper bound on reshuffles while looking for a fixed-point-free order.
pub const MAX_DERANGEMENT_ATTEMPTS: u32 = 10;

/// Extra wait after each move animation before the tick may end.
pub const SETTLE_MS: u64 = 20;

/// Elevation added to tokens while they travel.
pub const LIFT_OFFSET: f64 = 1.0;

// ── Countdown ───────────────────────────────────────────────────

pub const COUNTDOWN_FROM: u32 = 3;
pub const COUNTDOWN_STEP_MS: u64 = 1000;

// ── Camera framing ──────────────────────────────────────────────

/// Screen padding kept free on every side when framing tokens.
pub const FRAME_PADDING_PX: f64 = 100.0;
pub const MIN_FRAME_SCALE: f64 = 0.2;
pub const MAX_FRAME_SCALE: f64 = 3.0;
pub const FRAME_PAN_MS: u64 = 750;

// ── Setup ───────────────────────────────────────────────────────

/// Image shown for tokens that have none.
pub const DEFAULT_TOKEN_IMAGE: &str = "icons/svg/mystery-man.svg";
