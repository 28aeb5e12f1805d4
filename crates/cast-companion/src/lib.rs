//! cast-companion library crate.
//!
//! The companion keeps authoritative match state for a live-stream
//! production and pushes live updates to browser-based overlay sources
//! over WebSocket, runs named periodic background duties on a scheduler
//! thread, and fires one-shot overlay events from debounced physical
//! hotkeys.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Overlay browser sources (JSON over WebSocket)
//!         ↕
//! [cast-companion]
//!   ├── domain/           Pure types: ServerConfig, Settings, MatchStore boundary
//!   ├── application/      ConnectionRegistry, Broadcaster, TaskScheduler,
//!   │                     HotkeyService, IntroPresenter, change translation
//!   └── infrastructure/
//!         ├── ws_server/  WebSocket accept loop + liveness protocol (tokio-tungstenite)
//!         └── key_source/ Physical key-event seam (trait + test double)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no network I/O and no async beyond channel types used at
//!   the match-state boundary.
//! - `application` depends on `domain` and `cast-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tungstenite`.
//!
//! # Threading model
//!
//! One Tokio runtime multiplexes every open overlay connection; each
//! session is its own task, so a slow client never stalls the others.
//! The [`application::scheduler::TaskScheduler`] and the hotkey reader run
//! on dedicated OS threads.  Cross-thread broadcast requests go through
//! each connection's unbounded send channel (submit-and-continue), so no
//! caller ever waits on network I/O.

/// Domain layer: configuration, settings persistence, and the match-state
/// boundary.
pub mod domain;

/// Application layer: registry, broadcaster, scheduler, hotkeys, intros,
/// and match-change translation.
pub mod application;

/// Infrastructure layer: WebSocket server and the key-event source seam.
pub mod infrastructure;
