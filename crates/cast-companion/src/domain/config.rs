//! Runtime configuration for the overlay server.
//!
//! [`ServerConfig`] is the single source of truth for transport settings.
//! It is built once at startup (from CLI arguments or defaults) and shared
//! across all session tasks.
//!
//! # Port derivation
//!
//! The listening port is not configured directly: it is derived from the
//! active profile identifier, a short hexadecimal string.  Each profile
//! therefore gets a stable, collision-free loopback port, and the overlay
//! HTML shipped with a profile can hardcode its WebSocket URL.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// Error type for configuration construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The profile identifier did not parse as a 16-bit hexadecimal port.
    #[error("profile id '{0}' does not encode a valid port (expected 1-4 hex digits)")]
    InvalidProfileId(String),
}

/// Derives the listening port from a profile identifier.
///
/// The identifier is interpreted as a hexadecimal number; e.g. profile
/// `"c8d1"` listens on port 51409.
///
/// # Errors
///
/// [`ConfigError::InvalidProfileId`] when the string is not hex or does
/// not fit in a `u16`.
pub fn port_from_profile(profile_id: &str) -> Result<u16, ConfigError> {
    let trimmed = profile_id.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidProfileId(profile_id.to_string()));
    }
    u16::from_str_radix(trimmed, 16)
        .map_err(|_| ConfigError::InvalidProfileId(profile_id.to_string()))
}

/// All runtime transport configuration for the overlay server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address the WebSocket listener binds to.  Always loopback in
    /// production: overlay sources run on the same machine as the
    /// video-production tool.
    pub bind_addr: SocketAddr,

    /// How long an open connection may stay silent before the server
    /// issues a liveness probe.
    pub read_timeout: Duration,

    /// How long the server waits after a probe for *any* inbound frame
    /// before declaring the connection dead.
    pub pong_timeout: Duration,
}

impl ServerConfig {
    /// Builds a loopback config for the given profile identifier.
    ///
    /// # Errors
    ///
    /// Propagates [`ConfigError::InvalidProfileId`].
    pub fn for_profile(profile_id: &str) -> Result<Self, ConfigError> {
        let port = port_from_profile(profile_id)?;
        Ok(Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
            ..Self::default()
        })
    }
}

impl Default for ServerConfig {
    /// Defaults for local development: profile `c8d1`, the original's
    /// 20-second read window and 10-second probe window.
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0xc8d1),
            read_timeout: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
