//! Shell-game settings and the store they are read from.
//!
//! DESIGN
//! ======
//! The host owns persistence of settings; the core only reads named values
//! through [`SettingsStore`]. [`ShellSettings::load`] is called once per
//! shuffle so a session never sees values change mid-run. Absent or
//! malformed values fall back to defaults, and numeric values are clamped to
//! their documented bounds.

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::consts::{DEFAULT_MOVE_MS, DEFAULT_RUNTIME_MS, MAX_MOVE_MS, MAX_RUNTIME_MS, MIN_MOVE_MS, MIN_RUNTIME_MS};
use crate::matching::NameMatch;

pub const KEY_RUNTIME_MS: &str = "runtimeMs";
pub const KEY_MIN_MOVE_MS: &str = "minMoveMs";
pub const KEY_MAX_MOVE_MS: &str = "maxMoveMs";
pub const KEY_FORCE_ZOOM: &str = "forceZoom";
pub const KEY_LIFT_TOKENS: &str = "liftTokens";
pub const KEY_NAME_MATCH: &str = "nameMatch";

/// Read-only access to the host's settings.
pub trait SettingsStore: Send + Sync {
    /// Raw value for `key`, if the host has one.
    fn value(&self, key: &str) -> Option<Value>;
}

/// Settings read from `SHELL_*` environment variables.
///
/// - `SHELL_RUNTIME_MS`: default 8000, clamped to [1000, 60000]
/// - `SHELL_MIN_MOVE_MS` / `SHELL_MAX_MOVE_MS`: default 350, clamped to [50, 2500]
/// - `SHELL_FORCE_ZOOM`: default `true`
/// - `SHELL_LIFT_TOKENS`: default `false`
/// - `SHELL_NAME_MATCH`: `exact` (default) or `relaxed`
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl EnvSettings {
    fn var_for(key: &str) -> Option<&'static str> {
        match key {
            KEY_RUNTIME_MS => Some("SHELL_RUNTIME_MS"),
            KEY_MIN_MOVE_MS => Some("SHELL_MIN_MOVE_MS"),
            KEY_MAX_MOVE_MS => Some("SHELL_MAX_MOVE_MS"),
            KEY_FORCE_ZOOM => Some("SHELL_FORCE_ZOOM"),
            KEY_LIFT_TOKENS => Some("SHELL_LIFT_TOKENS"),
            KEY_NAME_MATCH => Some("SHELL_NAME_MATCH"),
            _ => None,
        }
    }
}

impl SettingsStore for EnvSettings {
    fn value(&self, key: &str) -> Option<Value> {
        let var = Self::var_for(key)?;
        std::env::var(var).ok().map(Value::String)
    }
}

/// In-memory settings, e.g. parsed from a JSON object.
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, Value>,
}

impl MapSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    /// Parse a JSON object of settings keyed by setting name.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let values: HashMap<String, Value> = serde_json::from_str(json)?;
        Ok(Self { values })
    }
}

impl SettingsStore for MapSettings {
    fn value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

// =============================================================================
// SHELL SETTINGS
// =============================================================================

/// Inclusive hop-duration range. Always `min_ms <= max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopRange {
    min_ms: u64,
    max_ms: u64,
}

impl HopRange {
    /// Build a range from two bounds given in either order.
    #[must_use]
    pub fn new(a: u64, b: u64) -> Self {
        Self { min_ms: a.min(b), max_ms: a.max(b) }
    }

    #[must_use]
    pub fn min_ms(self) -> u64 {
        self.min_ms
    }

    #[must_use]
    pub fn max_ms(self) -> u64 {
        self.max_ms
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellSettings {
    pub runtime_ms: u64,
    pub min_move_ms: u64,
    pub max_move_ms: u64,
    pub force_zoom: bool,
    pub lift_tokens: bool,
    pub name_match: NameMatch,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            runtime_ms: DEFAULT_RUNTIME_MS,
            min_move_ms: DEFAULT_MOVE_MS,
            max_move_ms: DEFAULT_MOVE_MS,
            force_zoom: true,
            lift_tokens: false,
            name_match: NameMatch::Exact,
        }
    }
}

impl ShellSettings {
    /// Snapshot the store, applying defaults and bounds.
    #[must_use]
    pub fn load(store: &dyn SettingsStore) -> Self {
        let defaults = Self::default();
        let settings = Self {
            runtime_ms: read_ms(store, KEY_RUNTIME_MS, defaults.runtime_ms).clamp(MIN_RUNTIME_MS, MAX_RUNTIME_MS),
            min_move_ms: read_ms(store, KEY_MIN_MOVE_MS, defaults.min_move_ms).clamp(MIN_MOVE_MS, MAX_MOVE_MS),
            max_move_ms: read_ms(store, KEY_MAX_MOVE_MS, defaults.max_move_ms).clamp(MIN_MOVE_MS, MAX_MOVE_MS),
            force_zoom: read_flag(store, KEY_FORCE_ZOOM, defaults.force_zoom),
            lift_tokens: read_flag(store, KEY_LIFT_TOKENS, defaults.lift_tokens),
            name_match: store
                .value(KEY_NAME_MATCH)
                .and_then(|v| v.as_str().and_then(NameMatch::parse))
                .unwrap_or(defaults.name_match),
        };
        debug!(?settings, "shell settings loaded");
        settings
    }

    /// Total shuffle budget, never below the one-second floor.
    #[must_use]
    pub fn runtime(&self) -> Duration {
        Duration::from_millis(self.runtime_ms.clamp(MIN_RUNTIME_MS, MAX_RUNTIME_MS))
    }

    #[must_use]
    pub fn hop_range(&self) -> HopRange {
        HopRange::new(self.min_move_ms, self.max_move_ms)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn read_ms(store: &dyn SettingsStore, key: &str, default: u64) -> u64 {
    let parsed = match store.value(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(ms) if ms.is_finite() && ms >= 0.0 => ms.round() as u64,
        _ => default,
    }
}

fn read_flag(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    match store.value(key) {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        _ => default,
    }
}
