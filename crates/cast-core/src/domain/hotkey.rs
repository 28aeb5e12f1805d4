//! Hotkey bindings and key-edge debouncing.
//!
//! Physical hotkeys trigger one-shot overlay events (player intros).  The
//! OS delivers a storm of auto-repeated key-down events while a key is
//! held; the [`KeyDebouncer`] collapses that storm into exactly one
//! trigger per physical press by tracking an "armed" flag per key: a
//! key-down fires only while armed, disarms the key, and the matching
//! key-up re-arms it.
//!
//! The debouncer is an explicit value owned by whoever dispatches hotkeys,
//! not shared ambient state, so tests can drive it with synthetic edges.

use std::collections::HashMap;

use tracing::trace;

/// A configured hotkey: human-readable key name plus the physical identity
/// `(scan_code, is_numpad)` that raw events are matched against.
///
/// The numpad flag disambiguates keys that share a scan code with their
/// main-block counterpart (e.g. numpad Enter vs. Enter); an event whose
/// flag differs from the binding's must never fire it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBinding {
    /// Display name (e.g. `"F1"`).  Empty means the binding is unset.
    pub name: String,
    /// Hardware scan code.  Zero means the binding is unset.
    pub scan_code: u16,
    /// `true` when the key is the numpad variant of its scan code.
    pub is_numpad: bool,
}

impl HotkeyBinding {
    /// The unset binding: never registered, never fires.
    pub fn unset() -> Self {
        Self {
            name: String::new(),
            scan_code: 0,
            is_numpad: false,
        }
    }

    /// Parses the settings-file form `"NAME, <scan_code>, <true|false>"`.
    ///
    /// Malformed strings parse to [`HotkeyBinding::unset`] rather than an
    /// error: a corrupt settings entry degrades to "no hotkey", it never
    /// prevents startup.
    pub fn parse(s: &str) -> Self {
        let mut parts = s.split(',');
        let (name, scan_code, is_numpad) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(code), Some(numpad)) if parts.next().is_none() => {
                let name = name.trim();
                let code = match code.trim().parse::<u16>() {
                    Ok(c) => c,
                    Err(_) => return Self::unset(),
                };
                (name.to_string(), code, numpad.trim().eq_ignore_ascii_case("true"))
            }
            _ => return Self::unset(),
        };
        Self {
            name,
            scan_code,
            is_numpad,
        }
    }

    /// Serializes back to the settings-file form accepted by [`parse`].
    ///
    /// [`parse`]: HotkeyBinding::parse
    pub fn dump(&self) -> String {
        format!("{}, {}, {}", self.name, self.scan_code, self.is_numpad)
    }

    /// `true` when the binding has an empty name or a zero scan code.
    /// Unset bindings are skipped at registration time.
    pub fn is_unset(&self) -> bool {
        self.name.is_empty() || self.scan_code == 0
    }

    /// The physical key identity this binding listens for.
    pub fn key(&self) -> (u16, bool) {
        (self.scan_code, self.is_numpad)
    }
}

/// Direction of a raw key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A raw physical key edge as delivered by a key-event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEdge {
    pub scan_code: u16,
    pub is_numpad: bool,
    pub direction: KeyDirection,
}

impl KeyEdge {
    pub fn down(scan_code: u16, is_numpad: bool) -> Self {
        Self {
            scan_code,
            is_numpad,
            direction: KeyDirection::Down,
        }
    }

    pub fn up(scan_code: u16, is_numpad: bool) -> Self {
        Self {
            scan_code,
            is_numpad,
            direction: KeyDirection::Up,
        }
    }

    /// The physical key identity of this edge.
    pub fn key(&self) -> (u16, bool) {
        (self.scan_code, self.is_numpad)
    }
}

/// Per-key edge-detection state.
///
/// Each key starts implicitly armed.  [`observe`] returns `true` exactly
/// when an edge should fire the key's bound action: a key-down while
/// armed (or never seen).  Key-down always disarms; key-up always re-arms.
/// Holding a key therefore fires once no matter how many auto-repeat
/// key-down events the OS generates.
///
/// [`observe`]: KeyDebouncer::observe
#[derive(Debug, Default)]
pub struct KeyDebouncer {
    armed: HashMap<(u16, bool), bool>,
}

impl KeyDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw edge through the state machine; returns whether the
    /// edge is a discrete "pressed" trigger.
    pub fn observe(&mut self, edge: &KeyEdge) -> bool {
        let key = edge.key();
        match edge.direction {
            KeyDirection::Down => {
                let fire = self.armed.get(&key).copied().unwrap_or(true);
                self.armed.insert(key, false);
                if fire {
                    trace!(scan_code = edge.scan_code, is_numpad = edge.is_numpad, "hotkey fired");
                }
                fire
            }
            KeyDirection::Up => {
                self.armed.insert(key, true);
                false
            }
        }
    }

    /// Clears all per-key state.  Called when the hotkey set is fully
    /// uninstalled so a later reinstall starts from a clean slate.
    pub fn reset(&mut self) {
        self.armed.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Binding parsing ───────────────────────────────────────────────────────

    #[test]
    fn test_parse_well_formed_binding() {
        let b = HotkeyBinding::parse("F1, 59, false");
        assert_eq!(b.name, "F1");
        assert_eq!(b.scan_code, 59);
        assert!(!b.is_numpad);
        assert!(!b.is_unset());
    }

    #[test]
    fn test_parse_numpad_flag_is_case_insensitive() {
        assert!(HotkeyBinding::parse("KP1, 79, True").is_numpad);
        assert!(HotkeyBinding::parse("KP1, 79, TRUE").is_numpad);
        assert!(!HotkeyBinding::parse("KP1, 79, false").is_numpad);
    }

    #[test]
    fn test_parse_malformed_strings_degrade_to_unset() {
        assert!(HotkeyBinding::parse("").is_unset());
        assert!(HotkeyBinding::parse("F1").is_unset());
        assert!(HotkeyBinding::parse("F1, notanumber, false").is_unset());
        assert!(HotkeyBinding::parse("F1, 59, false, extra").is_unset());
    }

    #[test]
    fn test_empty_name_or_zero_scan_code_is_unset() {
        assert!(HotkeyBinding::parse(", 59, false").is_unset());
        assert!(HotkeyBinding::parse("F1, 0, false").is_unset());
    }

    #[test]
    fn test_dump_round_trips_through_parse() {
        let b = HotkeyBinding {
            name: "F4".to_string(),
            scan_code: 62,
            is_numpad: true,
        };
        assert_eq!(HotkeyBinding::parse(&b.dump()), b);
    }

    // ── Debouncing ────────────────────────────────────────────────────────────

    #[test]
    fn test_first_key_down_fires() {
        let mut deb = KeyDebouncer::new();
        assert!(deb.observe(&KeyEdge::down(59, false)));
    }

    #[test]
    fn test_repeated_key_down_does_not_fire_until_key_up() {
        // down, down (auto-repeat), up, down → exactly two fires.
        let mut deb = KeyDebouncer::new();
        let mut fires = 0;
        for edge in [
            KeyEdge::down(59, false),
            KeyEdge::down(59, false),
            KeyEdge::up(59, false),
            KeyEdge::down(59, false),
        ] {
            if deb.observe(&edge) {
                fires += 1;
            }
        }
        assert_eq!(fires, 2);
    }

    #[test]
    fn test_key_up_never_fires() {
        let mut deb = KeyDebouncer::new();
        assert!(!deb.observe(&KeyEdge::up(59, false)));
    }

    #[test]
    fn test_numpad_variant_is_tracked_independently() {
        // Same scan code, different numpad flag: two separate keys.
        let mut deb = KeyDebouncer::new();
        assert!(deb.observe(&KeyEdge::down(28, false)));
        assert!(deb.observe(&KeyEdge::down(28, true)));
        // Both are now disarmed independently.
        assert!(!deb.observe(&KeyEdge::down(28, false)));
        assert!(!deb.observe(&KeyEdge::down(28, true)));
    }

    #[test]
    fn test_two_distinct_keys_do_not_interfere() {
        let mut deb = KeyDebouncer::new();
        assert!(deb.observe(&KeyEdge::down(59, false)));
        assert!(deb.observe(&KeyEdge::down(60, false)));
        deb.observe(&KeyEdge::up(59, false));
        assert!(deb.observe(&KeyEdge::down(59, false)));
        assert!(!deb.observe(&KeyEdge::down(60, false)));
    }

    #[test]
    fn test_reset_rearms_everything() {
        let mut deb = KeyDebouncer::new();
        assert!(deb.observe(&KeyEdge::down(59, false)));
        assert!(!deb.observe(&KeyEdge::down(59, false)));
        deb.reset();
        assert!(deb.observe(&KeyEdge::down(59, false)));
    }
}
