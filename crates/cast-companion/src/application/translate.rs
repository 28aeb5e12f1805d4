//! Translation from match-store change notifications to overlay events.
//!
//! Each [`MatchChange`] category maps to a fixed set of broadcasts on the
//! score scope; the overlay HTML knows element ids like `team1`, `score2`
//! and `logo1`, and the translator addresses those directly.  The pump
//! runs as a tokio task draining the store's change channel for the
//! lifetime of the process.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use cast_core::{events, Scope};

use crate::application::broadcaster::Broadcaster;
use crate::application::registry::BroadcastTarget;
use crate::domain::{race_logo, MatchChange, MatchStore, Settings};

/// Stateless translator; all match data is read back from the store at
/// translation time so bursts of changes never ship stale values.
pub struct ChangeTranslator {
    broadcaster: Broadcaster,
    store: Arc<dyn MatchStore>,
    settings: Settings,
}

impl ChangeTranslator {
    pub fn new(broadcaster: Broadcaster, store: Arc<dyn MatchStore>, settings: Settings) -> Self {
        Self {
            broadcaster,
            store,
            settings,
        }
    }

    /// Drains the change channel until the store side closes it.
    pub fn spawn(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<MatchChange>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                self.apply(&change);
            }
            debug!("match change channel closed, translator stopping");
        })
    }

    /// Translates one change into its overlay broadcasts.
    pub fn apply(&self, change: &MatchChange) {
        match change {
            MatchChange::Team { idx, value } => {
                // In solo matches the team row shows player names, which
                // the Player branch keeps current instead.
                if !self.store.is_solo() {
                    self.change_text(&format!("team{}", idx + 1), value);
                }
            }
            MatchChange::Score { set_idx } => {
                let score = self.store.score();
                for team in 0..2 {
                    self.change_text(&format!("score{}", team + 1), &score[team].to_string());
                    self.broadcaster.send(
                        Scope::Score,
                        events::CHANGE_SCORE,
                        json!({
                            "teamid": team + 1,
                            "setid": set_idx + 1,
                            "color": self.store.score_icon_color(team, *set_idx),
                        }),
                        None,
                    );
                }
                // The stock score overlay only renders the first race
                // logo; the second slot has no element to update.
                let next_set = self.store.next_set();
                self.change_logo(0, next_set);
            }
            MatchChange::Color { set_idx, color } => {
                for team in 0..2 {
                    self.broadcaster.send(
                        Scope::Score,
                        events::CHANGE_SCORE,
                        json!({
                            "teamid": team + 1,
                            "setid": set_idx + 1,
                            "color": color,
                        }),
                        None,
                    );
                }
            }
            MatchChange::Outcome(payload) => {
                self.broadcaster
                    .send(Scope::Score, events::SET_WINNER, payload.clone(), None);
            }
            MatchChange::Player {
                team_idx,
                set_idx,
                value,
            } => {
                if *set_idx == 0 && self.store.is_solo() {
                    self.change_text(&format!("team{}", team_idx + 1), value);
                }
            }
            MatchChange::Race { set_idx } => {
                // Only the upcoming set's races are on screen.
                if *set_idx == self.store.next_set() {
                    for team in 0..2 {
                        self.change_logo(team, *set_idx);
                    }
                }
            }
            MatchChange::Meta => {
                self.broadcaster
                    .send(Scope::Score, events::ALL_DATA, self.store.score_data(), None);
            }
        }
    }

    /// Sends `CHANGE_STYLE` with the stylesheet for the target's scope.
    /// `style` overrides the configured one (used by a live style picker).
    pub fn push_style(
        &self,
        target: impl Into<BroadcastTarget>,
        scope: Scope,
        style: Option<&str>,
    ) {
        let style = style.unwrap_or_else(|| self.settings.style.for_scope(scope));
        let file = format!("src/css/{scope}/{style}.css");
        self.broadcaster
            .send(target, events::CHANGE_STYLE, json!({ "file": file }), None);
    }

    /// Sends `CHANGE_FONT`: the configured custom font, or the sentinel
    /// `"DEFAULT"` telling the overlay to fall back to its built-in one.
    pub fn push_font(&self, target: impl Into<BroadcastTarget>) {
        let font = if self.settings.style.use_custom_font {
            self.settings.style.custom_font.as_str()
        } else {
            "DEFAULT"
        };
        self.broadcaster
            .send(target, events::CHANGE_FONT, json!({ "font": font }), None);
    }

    fn change_text(&self, id: &str, text: &str) {
        self.broadcaster.send(
            Scope::Score,
            events::CHANGE_TEXT,
            json!({ "id": id, "text": text }),
            None,
        );
    }

    fn change_logo(&self, team: usize, set_idx: usize) {
        let img = race_logo(&self.store.race(team, set_idx));
        self.broadcaster.send(
            Scope::Score,
            events::CHANGE_IMAGE,
            json!({ "id": format!("logo{}", team + 1), "img": img }),
            None,
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
