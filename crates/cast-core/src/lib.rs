//! # cast-core
//!
//! Shared library for overlaycast containing the overlay wire protocol,
//! scope/path validation, and hotkey domain logic.
//!
//! This crate is used by the companion application and by any future
//! tooling that needs to speak the overlay protocol.  It has zero
//! dependencies on OS APIs, network sockets, or async runtimes.
//!
//! # Architecture overview
//!
//! overlaycast is a desktop companion for live-stream match overlays: a
//! video-production tool renders browser "sources" (score box, player
//! intro, ...) that connect back to the companion over WebSocket and stay
//! synchronized with the authoritative match state.
//!
//! This crate defines:
//!
//! - **`protocol`** – What travels over the wire.  Every outbound frame is
//!   a JSON object `{"event", "data", "state"}` where `state` is a
//!   correlation token that a client can echo back as an acknowledgment.
//!
//! - **`domain`** – Pure business logic with no I/O.  Overlay scopes and
//!   the path grammar that selects them at connect time, hotkey binding
//!   parsing, and the key-edge debouncing state machine that turns raw
//!   key-down/key-up storms into single triggers.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cast_core::Scope` instead of `cast_core::domain::scope::Scope`.
pub use domain::hotkey::{HotkeyBinding, KeyDebouncer, KeyDirection, KeyEdge};
pub use domain::scope::{InvalidPathError, OverlayPath, Scope};
pub use protocol::messages::{events, new_correlation_token, OverlayMessage};
