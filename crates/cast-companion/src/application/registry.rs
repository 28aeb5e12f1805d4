//! ConnectionRegistry: which overlay clients are connected where.
//!
//! The registry owns two mappings:
//!
//! - **path → connections**: every open connection lives in exactly one
//!   path's set for its whole lifetime.
//! - **scope → paths**: the paths currently in use under each scope, so a
//!   broadcast addressed to a scope reaches every variant of a
//!   multi-instance overlay (e.g. `/score` and `/score_[0-1]`).
//!
//! Mutation happens from the connection-handling tasks on connect and
//! disconnect; everything handed out at send time is a snapshot `Vec`, so
//! in-flight iteration is unaffected by concurrent connects/disconnects.
//!
//! Every mutation emits exactly one [`ConnectionCountChanged`]
//! notification carrying the scope's live connection count — the hotkey
//! supervisor keys intro-hotkey installation off these, and a UI would
//! drive its connection indicators from them.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use cast_core::{OverlayPath, Scope};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Opaque handle identifying one open connection.
pub type ClientId = Uuid;

/// Shared, lock-guarded registry as used by the broadcaster and the
/// connection handlers.
pub type SharedRegistry = Arc<Mutex<ConnectionRegistry>>;

/// One frame queued on a connection's send channel.
///
/// The per-connection writer task drains these into the WebSocket sink in
/// order, which is what gives broadcasts their per-connection FIFO
/// guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A JSON text frame (serialized `OverlayMessage`).
    Text(String),
    /// A liveness probe.
    Ping,
    /// Starts the close handshake; the writer task sends it and stops.
    Close,
}

/// An open bidirectional channel to one overlay client.
///
/// Cloning is cheap: the clone shares the same send channel, so a snapshot
/// taken at send time still delivers to the live connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ClientId,
    pub tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl Connection {
    /// Creates a connection handle around a fresh send channel.
    pub fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }
}

/// Notification emitted after every register/unregister: the affected
/// scope and its live connection count immediately after the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCountChanged {
    pub count: usize,
    pub scope: Scope,
}

/// Where a broadcast goes.
#[derive(Debug, Clone)]
pub enum BroadcastTarget {
    /// Every connection under every path of a scope.
    Scope(Scope),
    /// The connections of one literal path component.
    Path(String),
    /// An explicit connection list, bypassing registry resolution (used
    /// to reply to a single just-connected client).
    Connections(Vec<Connection>),
}

impl From<Scope> for BroadcastTarget {
    fn from(scope: Scope) -> Self {
        BroadcastTarget::Scope(scope)
    }
}

impl From<&OverlayPath> for BroadcastTarget {
    fn from(path: &OverlayPath) -> Self {
        BroadcastTarget::Path(path.component().to_string())
    }
}

impl From<Connection> for BroadcastTarget {
    fn from(conn: Connection) -> Self {
        BroadcastTarget::Connections(vec![conn])
    }
}

impl From<Vec<Connection>> for BroadcastTarget {
    fn from(conns: Vec<Connection>) -> Self {
        BroadcastTarget::Connections(conns)
    }
}

impl From<&str> for BroadcastTarget {
    /// A bare string is a scope name when it matches one exactly,
    /// otherwise a literal path component.
    fn from(s: &str) -> Self {
        match s.parse::<Scope>() {
            Ok(scope) => BroadcastTarget::Scope(scope),
            Err(_) => BroadcastTarget::Path(s.to_string()),
        }
    }
}

/// The registry itself.  Construct with [`ConnectionRegistry::new`],
/// which also hands back the notification receiver.
pub struct ConnectionRegistry {
    connections_by_path: HashMap<String, Vec<Connection>>,
    paths_by_scope: HashMap<Scope, BTreeSet<String>>,
    events: mpsc::UnboundedSender<ConnectionCountChanged>,
}

impl ConnectionRegistry {
    /// Creates an empty registry together with the receiver for
    /// connection-count notifications.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectionCountChanged>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Self {
            connections_by_path: HashMap::new(),
            paths_by_scope: HashMap::new(),
            events: tx,
        };
        (registry, rx)
    }

    /// Creates a shared registry for use across tasks.
    pub fn new_shared() -> (SharedRegistry, mpsc::UnboundedReceiver<ConnectionCountChanged>) {
        let (registry, rx) = Self::new();
        (Arc::new(Mutex::new(registry)), rx)
    }

    /// Registers an open connection under a validated path.
    ///
    /// Path validation already happened in [`OverlayPath::parse`], so
    /// registration itself cannot fail.
    pub fn register(&mut self, conn: Connection, path: &OverlayPath) {
        let scope = path.scope();
        self.paths_by_scope
            .entry(scope)
            .or_default()
            .insert(path.component().to_string());

        let conns = self
            .connections_by_path
            .entry(path.component().to_string())
            .or_default();
        if conns.iter().all(|c| c.id != conn.id) {
            conns.push(conn);
        }

        let count = self.count(scope);
        debug!(path = %path, count, "overlay client registered");
        let _ = self.events.send(ConnectionCountChanged { count, scope });
    }

    /// Removes a connection from its path, dropping the path entry when it
    /// becomes empty.  Unknown (connection, path) pairs are a no-op: a
    /// connection that never completed registration may still be
    /// unregistered unconditionally on close.
    pub fn unregister(&mut self, id: ClientId, path: &OverlayPath) {
        let Some(conns) = self.connections_by_path.get_mut(path.component()) else {
            return;
        };
        let before = conns.len();
        conns.retain(|c| c.id != id);
        if conns.len() == before {
            return;
        }
        if conns.is_empty() {
            self.connections_by_path.remove(path.component());
            if let Some(paths) = self.paths_by_scope.get_mut(&path.scope()) {
                paths.remove(path.component());
            }
        }

        let scope = path.scope();
        let count = self.count(scope);
        debug!(path = %path, count, "overlay client unregistered");
        let _ = self.events.send(ConnectionCountChanged { count, scope });
    }

    /// Resolves a target to a snapshot of concrete connections.
    pub fn resolve(&self, target: &BroadcastTarget) -> Vec<Connection> {
        match target {
            BroadcastTarget::Scope(scope) => self
                .paths_by_scope
                .get(scope)
                .into_iter()
                .flatten()
                .flat_map(|path| self.connections_by_path.get(path).into_iter().flatten())
                .cloned()
                .collect(),
            BroadcastTarget::Path(path) => self
                .connections_by_path
                .get(path)
                .cloned()
                .unwrap_or_default(),
            BroadcastTarget::Connections(conns) => conns.clone(),
        }
    }

    /// Live connection count for one scope, across all its paths.
    pub fn count(&self, scope: Scope) -> usize {
        self.paths_by_scope
            .get(&scope)
            .into_iter()
            .flatten()
            .map(|path| {
                self.connections_by_path
                    .get(path)
                    .map(Vec::len)
                    .unwrap_or(0)
            })
            .sum()
    }

    /// The paths currently in use under one scope.
    pub fn paths(&self, scope: Scope) -> Vec<String> {
        self.paths_by_scope
            .get(&scope)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
