//! TOML-based settings persistence.
//!
//! The companion's user-tweakable knobs — hotkey bindings, intro
//! animation and volumes, overlay style and font — live in a small TOML
//! file.  Every field carries a serde default so a partial or absent file
//! works on first run and across upgrades.
//!
//! Hotkey bindings are stored in their string dump form
//! (`"F1, 59, false"`, see [`cast_core::HotkeyBinding`]) so the file stays
//! hand-editable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized to TOML.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Settings schema ───────────────────────────────────────────────────────────

/// Top-level persisted settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub intros: IntroSettings,
    #[serde(default)]
    pub style: StyleSettings,
}

/// Player-intro behaviour: hotkeys and presentation parameters that are
/// attached to every `SHOW_INTRO` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntroSettings {
    /// Binding dump for the player-1 intro trigger; empty = unset.
    #[serde(default)]
    pub hotkey_player1: String,
    /// Binding dump for the player-2 intro trigger; empty = unset.
    #[serde(default)]
    pub hotkey_player2: String,
    /// Binding dump for the intro debug-overlay toggle; empty = unset.
    #[serde(default)]
    pub hotkey_debug: String,
    /// Intro fanfare volume, 0–100.
    #[serde(default = "default_volume")]
    pub sound_volume: u32,
    /// Text-to-speech playback volume, 0–100.
    #[serde(default = "default_volume")]
    pub tts_volume: u32,
    /// Seconds the intro stays on screen.
    #[serde(default = "default_display_time")]
    pub display_time: f64,
    /// Intro animation name, lower-case.
    #[serde(default = "default_animation")]
    pub animation: String,
}

/// Overlay styling: per-scope stylesheet selection and the optional
/// custom font pushed to score overlays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleSettings {
    /// Stylesheet name for the score scope.
    #[serde(default = "default_style")]
    pub score: String,
    /// Stylesheet name for the intro scope.
    #[serde(default = "default_style")]
    pub intro: String,
    /// When false, overlays use their built-in font.
    #[serde(default)]
    pub use_custom_font: bool,
    /// Font family used when `use_custom_font` is set.
    #[serde(default = "default_font")]
    pub custom_font: String,
}

impl StyleSettings {
    /// The stylesheet configured for one scope.
    pub fn for_scope(&self, scope: cast_core::Scope) -> &str {
        match scope {
            cast_core::Scope::Score => &self.score,
            cast_core::Scope::Intro => &self.intro,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_volume() -> u32 {
    20
}
fn default_display_time() -> f64 {
    3.0
}
fn default_animation() -> String {
    "fanfare".to_string()
}
fn default_style() -> String {
    "default".to_string()
}
fn default_font() -> String {
    "Verdana".to_string()
}

impl Default for IntroSettings {
    fn default() -> Self {
        Self {
            hotkey_player1: String::new(),
            hotkey_player2: String::new(),
            hotkey_debug: String::new(),
            sound_volume: default_volume(),
            tts_volume: default_volume(),
            display_time: default_display_time(),
            animation: default_animation(),
        }
    }
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            score: default_style(),
            intro: default_style(),
            use_custom_font: false,
            custom_font: default_font(),
        }
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads settings from `path`, returning `Settings::default()` when the
/// file does not exist yet.
///
/// # Errors
///
/// [`SettingsError::Io`] for file-system errors other than "not found",
/// [`SettingsError::Parse`] for malformed TOML.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(source) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists settings to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`SettingsError::Io`] for file-system failures, [`SettingsError::Serialize`]
/// if serialization fails.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|source| SettingsError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }
    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
