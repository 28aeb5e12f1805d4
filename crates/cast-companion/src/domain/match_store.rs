//! The match-state collaborator boundary.
//!
//! The authoritative match data (teams, players, per-set results) is owned
//! by the surrounding application; the broadcast engine only *reads* it
//! and reacts to its change notifications.  [`MatchStore`] is that
//! read-only seam, and [`MatchChange`] is the notification vocabulary —
//! one variant per change category, each mapped to a set of outbound
//! overlay events by the translation layer.
//!
//! [`InMemoryMatchStore`] is the store used by the binary and by tests;
//! a GUI-backed store would implement the same trait.

use std::sync::{Arc, RwLock};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::domain::settings::Settings;

/// Score-icon color for a set the team has won.
pub const COLOR_WIN: &str = "#008000";
/// Score-icon color for a set the team has lost.
pub const COLOR_LOSS: &str = "#cc0000";
/// Score-icon color for an undecided set.
pub const COLOR_UNDECIDED: &str = "#f29b00";

/// A change notification raised by the match store.
///
/// Categories mirror the authoritative data model; the translation layer
/// maps each to zero or more scoped broadcasts.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchChange {
    /// A team name changed.
    Team { idx: usize, value: String },
    /// The outcome of one set changed (score totals move with it).
    Score { set_idx: usize },
    /// A score-icon color override for one set.
    Color { set_idx: usize, color: String },
    /// The match outcome was decided; payload is forwarded verbatim.
    Outcome(Value),
    /// A player name changed.
    Player {
        team_idx: usize,
        set_idx: usize,
        value: String,
    },
    /// A player's race/faction changed.
    Race { set_idx: usize },
    /// Match meta data (league, format) changed; overlays get a full
    /// snapshot.
    Meta,
}

/// Read accessors over the authoritative match data.
///
/// All methods take `&self` and must be callable from any thread; the
/// broadcast engine never mutates match data.
#[cfg_attr(test, mockall::automock)]
pub trait MatchStore: Send + Sync {
    /// Full snapshot for `ALL_DATA` frames.
    fn score_data(&self) -> Value;

    /// Sets won per team.
    fn score(&self) -> [u32; 2];

    /// Score-icon color for one (team, set) cell.
    fn score_icon_color(&self, team_idx: usize, set_idx: usize) -> String;

    /// Player name in one (team, set) cell.
    fn player(&self, team_idx: usize, set_idx: usize) -> String;

    /// Race/faction in one (team, set) cell.
    fn race(&self, team_idx: usize, set_idx: usize) -> String;

    /// Index of the next undecided set (the last set when all are decided).
    fn next_set(&self) -> usize;

    /// Whether this is a 1v1 match (team labels show player names).
    fn is_solo(&self) -> bool;

    /// Payload for a `SHOW_INTRO` frame for one player slot, including
    /// the presentation parameters from settings.
    fn intro_data(&self, slot: usize) -> Value;
}

/// Builds the overlay image path for a race logo.
pub fn race_logo(race: &str) -> String {
    format!("src/img/races/{}.png", race.replace(' ', "_"))
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// One set of the match.
#[derive(Debug, Clone, PartialEq)]
struct SetState {
    players: [String; 2],
    races: [String; 2],
    /// Index of the winning team, when decided.
    winner: Option<usize>,
}

impl Default for SetState {
    fn default() -> Self {
        Self {
            players: ["TBD".to_string(), "TBD".to_string()],
            races: ["Random".to_string(), "Random".to_string()],
            winner: None,
        }
    }
}

#[derive(Debug, Clone)]
struct MatchState {
    teams: [String; 2],
    league: String,
    solo: bool,
    sets: Vec<SetState>,
}

/// Thread-safe in-memory match store.
///
/// Mutators emit exactly one [`MatchChange`] per call on the channel
/// returned by [`InMemoryMatchStore::new`].  Reads take the lock briefly
/// and never block on I/O.
pub struct InMemoryMatchStore {
    state: RwLock<MatchState>,
    settings: Settings,
    changes: mpsc::UnboundedSender<MatchChange>,
}

impl InMemoryMatchStore {
    /// Creates a best-of-`sets` store together with the change-notification
    /// receiver.  The receiver is owned by the translation pump.
    pub fn new(settings: Settings, sets: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<MatchChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(Self {
            state: RwLock::new(MatchState {
                teams: ["Team 1".to_string(), "Team 2".to_string()],
                league: String::new(),
                solo: true,
                sets: vec![SetState::default(); sets.max(1)],
            }),
            settings,
            changes: tx,
        });
        (store, rx)
    }

    fn emit(&self, change: MatchChange) {
        // The receiver side disappearing (shutdown) is not an error.
        let _ = self.changes.send(change);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MatchState> {
        self.state.read().expect("match state lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MatchState> {
        self.state.write().expect("match state lock poisoned")
    }

    // ── Mutators (owned by the surrounding application) ───────────────────────

    pub fn set_team(&self, idx: usize, name: &str) {
        self.write().teams[idx % 2] = name.to_string();
        self.emit(MatchChange::Team {
            idx: idx % 2,
            value: name.to_string(),
        });
    }

    pub fn set_player(&self, team_idx: usize, set_idx: usize, name: &str) {
        {
            let mut state = self.write();
            if set_idx >= state.sets.len() {
                return;
            }
            state.sets[set_idx].players[team_idx % 2] = name.to_string();
        }
        self.emit(MatchChange::Player {
            team_idx: team_idx % 2,
            set_idx,
            value: name.to_string(),
        });
    }

    pub fn set_race(&self, team_idx: usize, set_idx: usize, race: &str) {
        {
            let mut state = self.write();
            if set_idx >= state.sets.len() {
                return;
            }
            state.sets[set_idx].races[team_idx % 2] = race.to_string();
        }
        self.emit(MatchChange::Race { set_idx });
    }

    /// Records (or clears) the winner of one set.
    pub fn set_winner(&self, set_idx: usize, winner: Option<usize>) {
        {
            let mut state = self.write();
            if set_idx >= state.sets.len() {
                return;
            }
            state.sets[set_idx].winner = winner.map(|w| w % 2);
        }
        self.emit(MatchChange::Score { set_idx });
    }

    /// Overrides the score-icon color of one set without changing its
    /// outcome.
    pub fn set_score_color(&self, set_idx: usize, color: &str) {
        self.emit(MatchChange::Color {
            set_idx,
            color: color.to_string(),
        });
    }

    /// Declares the match outcome; the payload reaches the score overlay
    /// verbatim as `SET_WINNER`.
    pub fn declare_outcome(&self, payload: Value) {
        self.emit(MatchChange::Outcome(payload));
    }

    pub fn set_league(&self, league: &str) {
        self.write().league = league.to_string();
        self.emit(MatchChange::Meta);
    }

    pub fn set_solo(&self, solo: bool) {
        self.write().solo = solo;
        self.emit(MatchChange::Meta);
    }
}

impl MatchStore for InMemoryMatchStore {
    fn score_data(&self) -> Value {
        let state = self.read();
        let score = count_score(&state);
        json!({
            "teams": state.teams,
            "score": score,
            "league": state.league,
            "solo": state.solo,
            "sets": state.sets.iter().map(|set| json!({
                "players": set.players,
                "races": set.races,
                "winner": set.winner,
            })).collect::<Vec<_>>(),
        })
    }

    fn score(&self) -> [u32; 2] {
        count_score(&self.read())
    }

    fn score_icon_color(&self, team_idx: usize, set_idx: usize) -> String {
        let state = self.read();
        let color = match state.sets.get(set_idx).and_then(|s| s.winner) {
            None => COLOR_UNDECIDED,
            Some(winner) if winner == team_idx % 2 => COLOR_WIN,
            Some(_) => COLOR_LOSS,
        };
        color.to_string()
    }

    fn player(&self, team_idx: usize, set_idx: usize) -> String {
        let state = self.read();
        state
            .sets
            .get(set_idx)
            .map(|s| s.players[team_idx % 2].clone())
            .unwrap_or_default()
    }

    fn race(&self, team_idx: usize, set_idx: usize) -> String {
        let state = self.read();
        state
            .sets
            .get(set_idx)
            .map(|s| s.races[team_idx % 2].clone())
            .unwrap_or_else(|| "Random".to_string())
    }

    fn next_set(&self) -> usize {
        let state = self.read();
        state
            .sets
            .iter()
            .position(|s| s.winner.is_none())
            .unwrap_or(state.sets.len().saturating_sub(1))
    }

    fn is_solo(&self) -> bool {
        self.read().solo
    }

    fn intro_data(&self, slot: usize) -> Value {
        let slot = slot % 2;
        let set_idx = self.next_set();
        let state = self.read();
        let set = &state.sets[set_idx];
        let race = &set.races[slot];

        let mut data = json!({
            "name": set.players[slot],
            "race": race,
            "logo": race_logo(race),
            "team": state.teams[slot],
            "display": "block",
            "volume": self.settings.intros.sound_volume,
            "tts_volume": self.settings.intros.tts_volume,
            "display_time": self.settings.intros.display_time,
            "animation": self.settings.intros.animation,
        });
        if self.settings.style.use_custom_font {
            data["font"] = json!(self.settings.style.custom_font);
        }
        data
    }
}

fn count_score(state: &MatchState) -> [u32; 2] {
    let mut score = [0u32; 2];
    for set in &state.sets {
        if let Some(winner) = set.winner {
            score[winner % 2] += 1;
        }
    }
    score
}

// ── Tests ─────────────────────────────────────────────────────────────────────
