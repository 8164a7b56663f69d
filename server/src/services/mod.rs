//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room state so the route handler can stay focused on
//! protocol translation and authorization.

pub mod room;
pub mod scene;
