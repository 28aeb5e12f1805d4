//! Domain layer: runtime configuration, persisted settings, and the
//! match-state collaborator boundary.

pub mod config;
pub mod match_store;
pub mod settings;

pub use config::{port_from_profile, ConfigError, ServerConfig};
pub use match_store::{
    race_logo, InMemoryMatchStore, MatchChange, MatchStore, COLOR_LOSS, COLOR_UNDECIDED, COLOR_WIN,
};
pub use settings::{
    load_settings, save_settings, IntroSettings, Settings, SettingsError, StyleSettings,
};
