//! Channel-backed key source.
//!
//! Implements the [`KeySource`] port without any OS hook: edges are
//! injected programmatically.  The binary wires this in where a platform
//! keyboard-hook backend would go, and tests use it to drive the hotkey
//! service deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use cast_core::KeyEdge;

use crate::application::hotkeys::{HookError, KeySource};

/// A [`KeySource`] fed by [`ChannelKeySource::inject`].
pub struct ChannelKeySource {
    sender: Mutex<Option<Sender<KeyEdge>>>,
    started: AtomicBool,
}

impl ChannelKeySource {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Feeds one edge into the stream.  Edges injected while the source
    /// is stopped are discarded, like keypresses with no hook installed.
    pub fn inject(&self, edge: KeyEdge) {
        let guard = self.sender.lock().expect("key source lock poisoned");
        if let Some(sender) = guard.as_ref() {
            let _ = sender.send(edge);
        }
    }

    /// Whether `start` has been called without a matching `stop`.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Default for ChannelKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for ChannelKeySource {
    fn start(&self) -> Result<Receiver<KeyEdge>, HookError> {
        let (tx, rx) = mpsc::channel();
        *self.sender.lock().expect("key source lock poisoned") = Some(tx);
        self.started.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender ends the receiver's iteration.
        *self.sender.lock().expect("key source lock poisoned") = None;
        self.started.store(false, Ordering::SeqCst);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
