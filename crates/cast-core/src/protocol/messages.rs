//! The overlay wire message and the outbound event vocabulary.
//!
//! Every frame the companion sends to an overlay source is one JSON
//! object:
//!
//! ```json
//! {"event": "CHANGE_SCORE", "data": {"teamid": 1, "setid": 1, "color": "#f29b00"}, "state": "<token>"}
//! ```
//!
//! There is no version field; overlay clients dispatch on the `event`
//! name and ignore events they do not know, which is what keeps the
//! vocabulary extensible.
//!
//! The `state` field is a **correlation token**: an opaque string that a
//! client may echo back verbatim as a bare text frame to acknowledge the
//! action that triggered the message (used by the intro overlay to report
//! "animation finished").  Callers that do not care pass no token and a
//! fresh one is generated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outbound event names recognized by the stock overlay sources.
///
/// Non-exhaustive by design; a new overlay can introduce new events
/// without touching this crate as long as it dispatches on strings.
pub mod events {
    /// Full match snapshot, sent to a freshly connected score overlay and
    /// on meta-data changes.
    pub const ALL_DATA: &str = "ALL_DATA";
    /// Replace the text content of one element (`{id, text}`).
    pub const CHANGE_TEXT: &str = "CHANGE_TEXT";
    /// Recolor one score icon (`{teamid, setid, color}`).
    pub const CHANGE_SCORE: &str = "CHANGE_SCORE";
    /// Swap one image (`{id, img}`).
    pub const CHANGE_IMAGE: &str = "CHANGE_IMAGE";
    /// Mark the match winner (payload passed through from the store).
    pub const SET_WINNER: &str = "SET_WINNER";
    /// Switch the overlay stylesheet (`{file}`).
    pub const CHANGE_STYLE: &str = "CHANGE_STYLE";
    /// Switch the overlay font (`{font}`).
    pub const CHANGE_FONT: &str = "CHANGE_FONT";
    /// Play a player intro (`{name, race, logo, ...}`).
    pub const SHOW_INTRO: &str = "SHOW_INTRO";
    /// Toggle the intro overlay's debug rendering (empty payload).
    pub const DEBUG_MODE: &str = "DEBUG_MODE";
}

/// Generates a fresh correlation token.
pub fn new_correlation_token() -> String {
    Uuid::new_v4().to_string()
}

/// One outbound overlay frame: `{event, data, state}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMessage {
    /// Event name the client dispatches on.
    pub event: String,
    /// Arbitrary structured payload; its shape is event-specific.
    pub data: Value,
    /// Correlation token for client acknowledgments.
    pub state: String,
}

impl OverlayMessage {
    /// Builds a message with the given correlation token.
    pub fn with_token(event: impl Into<String>, data: Value, state: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data,
            state: state.into(),
        }
    }

    /// Builds a message, generating a fresh correlation token.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self::with_token(event, data, new_correlation_token())
    }

    /// Serializes to the wire form.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures (only possible for payloads
    /// containing non-string map keys, which the companion never builds).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape_has_exactly_event_data_state() {
        let msg = OverlayMessage::with_token(
            events::CHANGE_SCORE,
            json!({"teamid": 1, "setid": 1, "color": "#f29b00"}),
            "tok-1",
        );
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["event"], "CHANGE_SCORE");
        assert_eq!(obj["data"]["teamid"], 1);
        assert_eq!(obj["state"], "tok-1");
    }

    #[test]
    fn test_new_generates_nonempty_unique_tokens() {
        let a = OverlayMessage::new(events::SHOW_INTRO, json!({}));
        let b = OverlayMessage::new(events::SHOW_INTRO, json!({}));
        assert!(!a.state.is_empty());
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn test_correlation_tokens_are_unique() {
        let t1 = new_correlation_token();
        let t2 = new_correlation_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_round_trip_through_serde() {
        let msg = OverlayMessage::with_token(events::ALL_DATA, json!({"score": [1, 2]}), "tok");
        let parsed: OverlayMessage = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_empty_payload_serializes_as_empty_object() {
        let msg = OverlayMessage::with_token(events::DEBUG_MODE, json!({}), "tok");
        let wire = msg.to_json().unwrap();
        assert!(wire.contains("\"data\":{}"), "got {wire}");
    }
}
