//! Overlay scopes and connection-path validation.
//!
//! Every overlay browser source connects with a path such as `/score`,
//! `/score_[0-1]`, or `/intro`.  The first path component that matches a
//! known scope template selects that connection's **scope** — the logical
//! overlay category it belongs to for the rest of its lifetime.
//!
//! Scopes are an exhaustive enum rather than a runtime string allow-list,
//! so adding a new overlay category forces every `match` over [`Scope`] to
//! be revisited at compile time.
//!
//! # Path grammar
//!
//! ```text
//! path       = "/" component *( "/" component )
//! component  = scope-name [ variant ]
//! variant    = "_[" DIGIT "-" DIGIT "]"        ; e.g. "_[0-1]"
//! ```
//!
//! Variants exist for multi-instance overlays that share one scope: two
//! independent score boxes connect as `/score` and `/score_[0-1]` and both
//! receive every broadcast addressed to the `score` scope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a connection path matches no known scope.
///
/// Connections presenting such a path are rejected before registration;
/// no registry state is mutated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidPathError {
    /// No component of the path matched a scope template.
    #[error("no component of '{0}' matches a known overlay scope")]
    NoMatchingScope(String),
    /// The path contained no components at all.
    #[error("empty connection path")]
    Empty,
}

/// A logical overlay category sharing one broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The score overlay.  Carries the full match snapshot: a client
    /// connecting under this scope is immediately sent `ALL_DATA`.
    Score,
    /// The player-intro overlay.  Hotkeys for triggering intros are only
    /// installed while at least one connection is open under this scope.
    Intro,
}

impl Scope {
    /// All scopes, in a fixed order.  Iterate this instead of hardcoding
    /// the variants so new scopes are picked up everywhere.
    pub const ALL: [Scope; 2] = [Scope::Score, Scope::Intro];

    /// The scope's canonical name as it appears in connection paths.
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Score => "score",
            Scope::Intro => "intro",
        }
    }

    /// Whether a freshly connected client under this scope is sent the
    /// full current match snapshot (`ALL_DATA`) before anything else.
    pub fn bears_initial_state(&self) -> bool {
        match self {
            Scope::Score => true,
            Scope::Intro => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scope {
    type Err = InvalidPathError;

    /// Parses an exact scope name (`"score"`, `"intro"`).  Variant
    /// suffixes are *not* accepted here; use [`OverlayPath::parse`] for
    /// full connection paths.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.name() == s)
            .ok_or_else(|| InvalidPathError::NoMatchingScope(s.to_string()))
    }
}

/// A validated connection path: one specific endpoint string together with
/// the scope it belongs to.
///
/// Many paths map to one scope (`/score` and `/score_[0-1]` are distinct
/// paths under the `score` scope), so broadcasts address either a scope
/// (all its paths) or one literal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverlayPath {
    scope: Scope,
    component: String,
}

impl OverlayPath {
    /// Validates a raw connection path against the scope templates.
    ///
    /// The path is split on `/` and the first component matching a scope
    /// template wins.  Extra components are ignored, matching the lenient
    /// behavior overlay clients have historically relied on.
    ///
    /// # Errors
    ///
    /// [`InvalidPathError::Empty`] when the path has no components, and
    /// [`InvalidPathError::NoMatchingScope`] when nothing matches.
    pub fn parse(raw: &str) -> Result<Self, InvalidPathError> {
        let mut saw_component = false;
        for component in raw.split('/').filter(|c| !c.is_empty()) {
            saw_component = true;
            if let Some(scope) = match_component(component) {
                return Ok(Self {
                    scope,
                    component: component.to_string(),
                });
            }
        }
        if saw_component {
            Err(InvalidPathError::NoMatchingScope(raw.to_string()))
        } else {
            Err(InvalidPathError::Empty)
        }
    }

    /// The scope this path belongs to.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The normalized path component (no leading slash), e.g.
    /// `"score_[0-1]"`.  This string keys the registry's path map.
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl fmt::Display for OverlayPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.component)
    }
}

/// Matches one path component against the scope templates: the exact scope
/// name, or the name followed by a `_[d-d]` variant suffix.
fn match_component(component: &str) -> Option<Scope> {
    for scope in Scope::ALL {
        match component.strip_prefix(scope.name()) {
            Some("") => return Some(scope),
            Some(rest) if is_variant_suffix(rest) => return Some(scope),
            _ => {}
        }
    }
    None
}

/// Recognizes the `_[d-d]` variant suffix (e.g. `_[0-1]`).
fn is_variant_suffix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 6
        && b[0] == b'_'
        && b[1] == b'['
        && b[2].is_ascii_digit()
        && b[3] == b'-'
        && b[4].is_ascii_digit()
        && b[5] == b']'
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_score_path() {
        let path = OverlayPath::parse("/score").unwrap();
        assert_eq!(path.scope(), Scope::Score);
        assert_eq!(path.component(), "score");
    }

    #[test]
    fn test_parse_plain_intro_path() {
        let path = OverlayPath::parse("/intro").unwrap();
        assert_eq!(path.scope(), Scope::Intro);
        assert_eq!(path.component(), "intro");
    }

    #[test]
    fn test_parse_variant_path_keeps_component_but_maps_to_scope() {
        let path = OverlayPath::parse("/score_[0-1]").unwrap();
        assert_eq!(path.scope(), Scope::Score);
        assert_eq!(path.component(), "score_[0-1]");
    }

    #[test]
    fn test_parse_rejects_unknown_component() {
        let err = OverlayPath::parse("/banner").unwrap_err();
        assert!(matches!(err, InvalidPathError::NoMatchingScope(_)));
    }

    #[test]
    fn test_parse_rejects_scope_name_with_arbitrary_suffix() {
        // "scoreboard" must not silently become the score scope.
        let err = OverlayPath::parse("/scoreboard").unwrap_err();
        assert!(matches!(err, InvalidPathError::NoMatchingScope(_)));
    }

    #[test]
    fn test_parse_rejects_malformed_variant_suffix() {
        assert!(OverlayPath::parse("/score_[0-]").is_err());
        assert!(OverlayPath::parse("/score_[ab]").is_err());
        assert!(OverlayPath::parse("/score_0-1").is_err());
    }

    #[test]
    fn test_parse_empty_path_is_distinct_error() {
        assert_eq!(OverlayPath::parse("/").unwrap_err(), InvalidPathError::Empty);
        assert_eq!(OverlayPath::parse("").unwrap_err(), InvalidPathError::Empty);
    }

    #[test]
    fn test_parse_takes_first_matching_component() {
        // Extra components after the match are ignored.
        let path = OverlayPath::parse("/score/extra").unwrap();
        assert_eq!(path.component(), "score");
    }

    #[test]
    fn test_parse_skips_nonmatching_leading_component() {
        let path = OverlayPath::parse("/v1/intro").unwrap();
        assert_eq!(path.scope(), Scope::Intro);
        assert_eq!(path.component(), "intro");
    }

    #[test]
    fn test_scope_from_str_exact_names_only() {
        assert_eq!("score".parse::<Scope>().unwrap(), Scope::Score);
        assert_eq!("intro".parse::<Scope>().unwrap(), Scope::Intro);
        assert!("score_[0-1]".parse::<Scope>().is_err());
    }

    #[test]
    fn test_score_bears_initial_state_and_intro_does_not() {
        assert!(Scope::Score.bears_initial_state());
        assert!(!Scope::Intro.bears_initial_state());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let path = OverlayPath::parse("/score_[0-1]").unwrap();
        let reparsed = OverlayPath::parse(&path.to_string()).unwrap();
        assert_eq!(path, reparsed);
    }
}
