//! Broadcaster: the single seam through which state reaches overlays.
//!
//! Every outbound frame, whether a scope-wide score update or a reply to a
//! single connection, goes through [`Broadcaster::send`].  The call is
//! non-blocking: it resolves the target against the registry, serializes
//! the message once, and queues it on each connection's unbounded send
//! channel.  A queue whose reader is gone (connection mid-teardown) is
//! logged and skipped; it never aborts delivery to the others.

use serde_json::Value;
use tracing::{debug, warn};

use cast_core::{new_correlation_token, OverlayMessage};

use crate::application::registry::{BroadcastTarget, OutboundFrame, SharedRegistry};

/// Cheaply cloneable broadcast handle shared by the translation pump, the
/// intro presenter, and the connection handlers.
#[derive(Clone)]
pub struct Broadcaster {
    registry: SharedRegistry,
}

impl Broadcaster {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Broadcasts `{event, data, state}` to every connection the target
    /// resolves to and returns the correlation token used.
    ///
    /// When `token` is `None` (or empty) a fresh token is generated, so
    /// the caller can correlate client acknowledgments either way.  A
    /// target resolving to zero connections still returns a token; the
    /// send is simply a no-op.
    pub fn send(
        &self,
        target: impl Into<BroadcastTarget>,
        event: &str,
        data: Value,
        token: Option<String>,
    ) -> String {
        let target = target.into();
        let token = token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(new_correlation_token);
        let message = OverlayMessage::with_token(event, data, token.clone());

        let wire = match message.to_json() {
            Ok(wire) => wire,
            Err(e) => {
                warn!(event, "dropping unserializable overlay message: {e}");
                return token;
            }
        };

        let connections = self
            .registry
            .lock()
            .expect("connection registry lock poisoned")
            .resolve(&target);

        debug!(event, recipients = connections.len(), "broadcasting");
        for conn in connections {
            if conn.tx.send(OutboundFrame::Text(wire.clone())).is_err() {
                // Connection is tearing down; its unregister will follow.
                warn!(client = %conn.id, event, "send queue closed, skipping");
            }
        }
        token
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
