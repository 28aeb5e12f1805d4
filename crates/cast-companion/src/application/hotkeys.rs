//! Global hotkey dispatch.
//!
//! The [`KeySource`] port abstracts over the platform keyboard hook; the
//! service consumes its raw [`KeyEdge`] stream on a dedicated reader
//! thread, debounces auto-repeat, and fires the matching actions.
//!
//! Hotkeys are not installed for the lifetime of the process: the
//! supervisor installs them while at least one intro overlay is connected
//! and uninstalls them when the last one leaves, so the keyboard hook is
//! only live when a keypress could have a visible effect.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use cast_core::{events, HotkeyBinding, KeyDebouncer, KeyEdge, Scope};

use crate::application::broadcaster::Broadcaster;
use crate::application::intro::{IntroPresenter, IntroSlot};
use crate::application::registry::ConnectionCountChanged;
use crate::domain::IntroSettings;

/// Error type for keyboard hook installation.
#[derive(Debug, Error)]
pub enum HookError {
    /// The platform hook could not be installed.
    #[error("keyboard hook unavailable: {0}")]
    Unavailable(String),
}

/// Port over a platform keyboard hook.
///
/// `start` installs the hook and hands back the raw edge stream; `stop`
/// removes the hook, which also ends the stream.  Implementations live in
/// the infrastructure layer.
pub trait KeySource: Send + Sync {
    /// Installs the hook and returns the edge stream.
    ///
    /// # Errors
    ///
    /// [`HookError::Unavailable`] when the hook cannot be installed.
    fn start(&self) -> Result<std::sync::mpsc::Receiver<KeyEdge>, HookError>;

    /// Removes the hook.  The receiver returned by `start` sees the
    /// stream end shortly after.
    fn stop(&self);
}

/// Action fired when a bound key goes down.
pub type HotkeyAction = Arc<dyn Fn() + Send + Sync>;

/// Owns the reader thread that turns key edges into actions.
pub struct HotkeyService {
    source: Arc<dyn KeySource>,
    reader: Option<JoinHandle<()>>,
}

impl HotkeyService {
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self {
            source,
            reader: None,
        }
    }

    /// Installs the hook and starts dispatching the given bindings.
    /// Unset bindings are filtered out; installing while already
    /// installed is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates [`HookError`] from the key source.
    pub fn install(
        &mut self,
        bindings: Vec<(HotkeyBinding, HotkeyAction)>,
    ) -> Result<(), HookError> {
        if self.reader.is_some() {
            return Ok(());
        }
        let bindings: Vec<_> = bindings
            .into_iter()
            .filter(|(binding, _)| !binding.is_unset())
            .collect();
        if bindings.is_empty() {
            debug!("no hotkeys bound, hook not installed");
            return Ok(());
        }

        let rx = self.source.start()?;
        info!(count = bindings.len(), "hotkeys installed");
        self.reader = Some(
            thread::Builder::new()
                .name("hotkey-dispatch".to_string())
                .spawn(move || dispatch_loop(rx, bindings))
                .map_err(|e| HookError::Unavailable(e.to_string()))?,
        );
        Ok(())
    }

    /// Removes the hook and joins the reader thread.  Idempotent.
    pub fn uninstall(&mut self) {
        if let Some(handle) = self.reader.take() {
            self.source.stop();
            let _ = handle.join();
            info!("hotkeys uninstalled");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.reader.is_some()
    }
}

impl Drop for HotkeyService {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Runs until the edge stream ends.  Each install gets a fresh debouncer,
/// so a key physically held across an uninstall/reinstall fires again.
fn dispatch_loop(
    rx: std::sync::mpsc::Receiver<KeyEdge>,
    bindings: Vec<(HotkeyBinding, HotkeyAction)>,
) {
    let mut debouncer = KeyDebouncer::new();
    for edge in rx {
        if !debouncer.observe(&edge) {
            continue;
        }
        for (binding, action) in &bindings {
            if binding.key() == edge.key() {
                debug!(hotkey = %binding.name, "hotkey fired");
                action();
            }
        }
    }
    debug!("hotkey dispatch loop ended");
}

// ── Intro bindings ────────────────────────────────────────────────────────────

/// Builds the intro-scope bindings from the current settings.
///
/// When both player hotkeys are set to the *same* key, they collapse into
/// a single round-robin binding that alternates players on each
/// acknowledged intro.
pub fn intro_bindings(
    settings: &IntroSettings,
    presenter: &Arc<IntroPresenter>,
    broadcaster: &Broadcaster,
) -> Vec<(HotkeyBinding, HotkeyAction)> {
    let player1 = HotkeyBinding::parse(&settings.hotkey_player1);
    let player2 = HotkeyBinding::parse(&settings.hotkey_player2);
    let debug_toggle = HotkeyBinding::parse(&settings.hotkey_debug);

    let mut bindings: Vec<(HotkeyBinding, HotkeyAction)> = Vec::new();

    if !player1.is_unset() && player1.key() == player2.key() {
        let p = Arc::clone(presenter);
        bindings.push((
            player1,
            Arc::new(move || {
                p.show(IntroSlot::RoundRobin);
            }),
        ));
    } else {
        let p = Arc::clone(presenter);
        bindings.push((
            player1,
            Arc::new(move || {
                p.show(IntroSlot::Player(0));
            }),
        ));
        let p = Arc::clone(presenter);
        bindings.push((
            player2,
            Arc::new(move || {
                p.show(IntroSlot::Player(1));
            }),
        ));
    }

    let b = broadcaster.clone();
    bindings.push((
        debug_toggle,
        Arc::new(move || {
            b.send(Scope::Intro, events::DEBUG_MODE, json!({}), None);
        }),
    ));

    bindings
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Watches registry notifications and keeps the hook installed exactly
/// while the intro scope has connections.  Bindings are rebuilt on each
/// install so settings edits between installs take effect.
pub fn spawn_hotkey_supervisor(
    mut events: tokio::sync::mpsc::UnboundedReceiver<ConnectionCountChanged>,
    service: Arc<Mutex<HotkeyService>>,
    bindings_factory: impl Fn() -> Vec<(HotkeyBinding, HotkeyAction)> + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if event.scope != Scope::Intro {
                continue;
            }
            let mut service = service.lock().expect("hotkey service lock poisoned");
            if event.count > 0 {
                if let Err(e) = service.install((bindings_factory)()) {
                    warn!("failed to install hotkeys: {e}");
                }
            } else {
                service.uninstall();
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
