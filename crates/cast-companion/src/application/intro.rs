//! Player-intro presentation and acknowledgment tracking.
//!
//! Showing an intro broadcasts `SHOW_INTRO` to the intro scope and records
//! the frame's correlation token as **pending**.  The intro overlay echoes
//! that token back as a bare text frame once its animation finished;
//! [`IntroPresenter::acknowledge`] matches the echo, clears the pending
//! token, and advances the round-robin player index.
//!
//! Only one intro is pending at a time: triggering a new intro while an
//! acknowledgment is outstanding simply replaces the pending token
//! (latest wins), so a stale echo from the superseded intro is ignored.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use cast_core::{events, new_correlation_token, Scope};

use crate::application::broadcaster::Broadcaster;
use crate::domain::MatchStore;

/// Which player an intro trigger addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntroSlot {
    /// A fixed player slot (0 or 1).
    Player(usize),
    /// Alternate between the two players on each *acknowledged* intro.
    /// This is what a single shared hotkey binds to.
    RoundRobin,
}

#[derive(Default)]
struct IntroState {
    /// Correlation token of the intro awaiting its client echo.
    pending: Option<String>,
    /// Next player index a round-robin trigger resolves to.
    idx: usize,
}

/// Coordinates intro broadcasts with their client acknowledgments.
pub struct IntroPresenter {
    broadcaster: Broadcaster,
    store: Arc<dyn MatchStore>,
    state: Mutex<IntroState>,
}

impl IntroPresenter {
    pub fn new(broadcaster: Broadcaster, store: Arc<dyn MatchStore>) -> Arc<Self> {
        Arc::new(Self {
            broadcaster,
            store,
            state: Mutex::new(IntroState::default()),
        })
    }

    /// Broadcasts a `SHOW_INTRO` for the resolved player slot and records
    /// its correlation token as pending, replacing any previous one.
    /// Returns the token.
    pub fn show(&self, slot: IntroSlot) -> String {
        // The state lock is held across the broadcast so the pending token
        // always belongs to whichever overlapping trigger sent last.
        let mut state = self.lock();
        let player = match slot {
            IntroSlot::Player(i) => i % 2,
            IntroSlot::RoundRobin => state.idx,
        };
        let data = self.store.intro_data(player);
        let token = new_correlation_token();
        self.broadcaster
            .send(Scope::Intro, events::SHOW_INTRO, data, Some(token.clone()));
        state.pending = Some(token.clone());
        info!(player, "intro triggered");
        token
    }

    /// Handles a text frame received from an intro-scope client.  Returns
    /// `true` when the frame matched the pending token: the token is
    /// cleared and the round-robin index advances.  Stale or unknown
    /// frames return `false` and change nothing.
    pub fn acknowledge(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let mut state = self.lock();
        if state.pending.as_deref() != Some(text) {
            debug!("ignoring stale intro acknowledgment");
            return false;
        }
        state.pending = None;
        state.idx = (state.idx + 1) % 2;
        debug!(next_player = state.idx, "intro acknowledged");
        true
    }

    /// The player index the next round-robin trigger resolves to.
    pub fn round_robin_slot(&self) -> usize {
        self.lock().idx
    }

    /// The correlation token awaiting acknowledgment, if any.
    pub fn pending_token(&self) -> Option<String> {
        self.lock().pending.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IntroState> {
        self.state.lock().expect("intro state lock poisoned")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
