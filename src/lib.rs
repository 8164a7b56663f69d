//! Shell game for a shared virtual tabletop.
//!
//! The GM names a token; every player confirms they are watching; then each
//! client shuffles all tokens with that name (real ones and their
//! `"(Fake)"` decoys) through a flurry of random hops so the players can try
//! to follow the real one. The tabletop itself is a collaborator reached
//! through the capability traits in [`host`]; other clients are reached
//! through a [`relay::Relay`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`client`] | Per-client entry point: chat commands, relayed events, countdown |
//! | [`ready`] | Readiness Coordinator barrier and ready-check panel data |
//! | [`shuffle`] | Shuffle Engine: slot assignment, rotation steps, tick loop |
//! | [`setup`] | Decoy candidates and click-to-place decoy creation |
//! | [`command`] | `/shell` chat command parsing |
//! | [`relay`] | Event fan-out trait and the in-process hub |
//! | [`host`] | Tabletop capability traits and the [`host::Host`] bundle |
//! | [`wait`] | Awaitable delays: tokio timer or external scheduler |
//! | [`settings`] | Settings store and the typed, clamped settings snapshot |
//! | [`matching`] | Real/decoy token-name matching |
//! | [`camera`] | Force-zoom framing math and camera conversions |
//! | [`error`] | `ShellError`, codes and notification severities |
//! | [`consts`] | Shared numeric constants (timings, bounds, padding) |

pub mod camera;
pub mod client;
pub mod command;
pub mod consts;
pub mod error;
pub mod host;
pub mod matching;
pub mod ready;
pub mod relay;
pub mod settings;
pub mod setup;
pub mod shuffle;
pub mod wait;

#[cfg(test)]
mod test_support;

pub use client::{ChatOutcome, ShellClient, pump};
pub use error::{Severity, ShellError};
pub use frames::{Participant, ReadyAnswer, Role, ShellEvent, Token};
pub use host::Host;
