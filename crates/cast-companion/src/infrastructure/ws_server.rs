//! WebSocket server: accept loop and per-session lifecycle.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured loopback address.
//! 2. Accepting connections from overlay browser sources.
//! 3. Upgrading each connection and validating its request path against
//!    the scope templates; invalid paths are dropped before registration.
//! 4. Registering the connection and, for scopes that bear initial state,
//!    sending the full `ALL_DATA` snapshot to the new client.
//! 5. Running the liveness protocol: after `read_timeout` of silence a
//!    Ping is queued, and if nothing at all arrives within `pong_timeout`
//!    the connection is declared dead.
//! 6. Forwarding inbound text frames to the intro presenter, which
//!    matches them against the pending intro acknowledgment token.
//!
//! Each session runs in its own Tokio task with a dedicated writer task
//! draining the connection's send queue, so one slow overlay never delays
//! broadcasts to the others.  Shutdown is cooperative: a shared
//! `AtomicBool` stops the accept loop (checked every 200 ms), and a watch
//! channel tells every open session to run its close handshake;
//! [`ServerHandle::shutdown`] waits for the session tasks to finish.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{Request, Response},
        Message as WsMessage,
    },
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use cast_core::{events, OverlayPath};

use crate::application::broadcaster::Broadcaster;
use crate::application::intro::IntroPresenter;
use crate::application::registry::{Connection, OutboundFrame, SharedRegistry};
use crate::domain::{MatchStore, ServerConfig};

/// Error type for server startup.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The TCP listener could not be bound (port in use, etc.).
    #[error("failed to bind overlay listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a session task needs, shared across all sessions.
struct SessionContext {
    config: ServerConfig,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    store: Arc<dyn MatchStore>,
    presenter: Arc<IntroPresenter>,
    shutdown_rx: watch::Receiver<bool>,
}

/// The overlay WebSocket server, ready to be spawned.
pub struct OverlayServer {
    pub config: ServerConfig,
    pub registry: SharedRegistry,
    pub broadcaster: Broadcaster,
    pub store: Arc<dyn MatchStore>,
    pub presenter: Arc<IntroPresenter>,
}

/// Handle to a running server: the bound address and a cooperative
/// shutdown switch.
pub struct ServerHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept_task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    sessions: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ServerHandle {
    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections, then asks every open session to
    /// run its close handshake and waits for the session tasks to finish.
    /// A peer that never answers the close is given the pong-timeout
    /// grace window before its session ends anyway, so the drain is
    /// bounded.
    pub async fn shutdown(self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.accept_task.await;

        let _ = self.shutdown_tx.send(true);
        let open: Vec<_> = self
            .sessions
            .lock()
            .expect("session roster lock poisoned")
            .drain(..)
            .collect();
        for session in open {
            let _ = session.await;
        }
    }
}

impl OverlayServer {
    /// Binds the listener and spawns the accept loop.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the configured address is unavailable.
    pub async fn spawn(self) -> Result<ServerHandle, ServerError> {
        let listener =
            TcpListener::bind(self.config.bind_addr)
                .await
                .map_err(|source| ServerError::Bind {
                    addr: self.config.bind_addr,
                    source,
                })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: self.config.bind_addr,
            source,
        })?;
        info!("overlay server listening on {local_addr}");

        let running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sessions: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
        let ctx = Arc::new(SessionContext {
            config: self.config,
            registry: self.registry,
            broadcaster: self.broadcaster,
            store: self.store,
            presenter: self.presenter,
            shutdown_rx,
        });

        let accept_running = Arc::clone(&running);
        let accept_sessions = Arc::clone(&sessions);
        let accept_task = tokio::spawn(async move {
            accept_loop(listener, ctx, accept_running, accept_sessions).await;
        });

        Ok(ServerHandle {
            local_addr,
            running,
            accept_task,
            shutdown_tx,
            sessions,
        })
    }
}

/// Accepts connections until the running flag is cleared.  A short accept
/// timeout keeps the flag check responsive even when no overlay is
/// connecting.
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    running: Arc<AtomicBool>,
    sessions: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new overlay connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                let session = tokio::spawn(async move {
                    handle_session(stream, peer_addr, ctx).await;
                });
                let mut roster = sessions.lock().expect("session roster lock poisoned");
                roster.retain(|task| !task.is_finished());
                roster.push(session);
            }
            Ok(Err(e)) => {
                // Transient accept error; keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection attempt in the last 200 ms.
            }
        }
    }
}

/// Entry point of each per-session task; logs the outcome so
/// `run_session` can use `?` freely.
async fn handle_session(raw_stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<SessionContext>) {
    match run_session(raw_stream, peer_addr, ctx).await {
        Ok(()) => info!("session {peer_addr} closed"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<SessionContext>,
) -> anyhow::Result<()> {
    // Capture the HTTP request path during the upgrade handshake; it
    // decides the connection's scope.
    let mut request_path = String::new();
    let ws_stream = accept_hdr_async(raw_stream, |req: &Request, resp: Response| {
        request_path = req.uri().path().to_string();
        Ok(resp)
    })
    .await?;

    let path = match OverlayPath::parse(&request_path) {
        Ok(path) => path,
        Err(e) => {
            // Reject before any registry mutation.
            info!("rejecting {peer_addr}: {e}");
            return Ok(());
        }
    };
    info!(path = %path, "overlay client connected from {peer_addr}");

    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let conn = Connection::new(frames_tx);
    let client_id = conn.id;
    let ping_tx = conn.tx.clone();
    ctx.registry
        .lock()
        .expect("connection registry lock poisoned")
        .register(conn.clone(), &path);

    // A fresh score overlay starts from the full snapshot.
    if path.scope().bears_initial_state() {
        ctx.broadcaster
            .send(conn, events::ALL_DATA, ctx.store.score_data(), None);
    }

    let (mut sink, mut stream) = ws_stream.split();

    // Writer task: drains this connection's send queue into the socket in
    // FIFO order.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            let msg = match frame {
                OutboundFrame::Text(text) => WsMessage::Text(text),
                OutboundFrame::Ping => WsMessage::Ping(Vec::new()),
                OutboundFrame::Close => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            };
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Read loop with the liveness protocol.  A server shutdown interrupts
    // the wait and switches the session to its close handshake.
    let mut shutdown_rx = ctx.shutdown_rx.clone();
    loop {
        tokio::select! {
            res = timeout(ctx.config.read_timeout, stream.next()) => match res {
                Ok(Some(Ok(msg))) => {
                    if !handle_frame(msg, &ctx, peer_addr) {
                        break;
                    }
                }
                Ok(Some(Err(e))) => {
                    debug!("session {peer_addr}: read error: {e}");
                    break;
                }
                Ok(None) => {
                    debug!("session {peer_addr}: stream ended");
                    break;
                }
                Err(_) => {
                    // Silent too long: probe, then give the client one more
                    // window to produce any frame at all.
                    if ping_tx.send(OutboundFrame::Ping).is_err() {
                        break;
                    }
                    let mut pong_shutdown_rx = ctx.shutdown_rx.clone();
                    tokio::select! {
                        res = timeout(ctx.config.pong_timeout, stream.next()) => match res {
                            Ok(Some(Ok(msg))) => {
                                if !handle_frame(msg, &ctx, peer_addr) {
                                    break;
                                }
                            }
                            Ok(Some(Err(_))) | Ok(None) => break,
                            Err(_) => {
                                info!("session {peer_addr}: no response to ping, disconnecting");
                                break;
                            }
                        },
                        _ = async { let _ = pong_shutdown_rx.wait_for(|stop| *stop).await; } => {
                            close_session(&ping_tx, &mut stream, ctx.config.pong_timeout, peer_addr).await;
                            break;
                        }
                    }
                }
            },
            _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => {
                close_session(&ping_tx, &mut stream, ctx.config.pong_timeout, peer_addr).await;
                break;
            }
        }
    }

    // Unconditional teardown, also on error paths above.
    ctx.registry
        .lock()
        .expect("connection registry lock poisoned")
        .unregister(client_id, &path);
    writer_task.abort();
    Ok(())
}

/// Queues a close frame for the writer and waits up to `grace` for the
/// peer's close echo, so shutdown leaves no half-open sockets behind.
async fn close_session(
    tx: &mpsc::UnboundedSender<OutboundFrame>,
    stream: &mut SplitStream<WebSocketStream<TcpStream>>,
    grace: Duration,
    peer_addr: SocketAddr,
) {
    info!("session {peer_addr}: closing for server shutdown");
    let _ = tx.send(OutboundFrame::Close);
    let _ = timeout(grace, async {
        while let Some(Ok(msg)) = stream.next().await {
            if matches!(msg, WsMessage::Close(_)) {
                break;
            }
        }
    })
    .await;
}

/// Processes one inbound frame.  Returns `false` when the session should
/// end.
fn handle_frame(msg: WsMessage, ctx: &SessionContext, peer_addr: SocketAddr) -> bool {
    match msg {
        WsMessage::Text(text) => {
            // The only application-level inbound traffic is the intro
            // acknowledgment echo.
            if ctx.presenter.acknowledge(&text) {
                debug!("session {peer_addr}: intro acknowledged");
            } else {
                debug!("session {peer_addr}: unmatched text frame ignored");
            }
            true
        }
        WsMessage::Close(_) => {
            debug!("session {peer_addr}: close frame received");
            false
        }
        // Pong (and any other control frame) counts as liveness simply by
        // arriving; nothing to do with its content.
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) | WsMessage::Frame(_) => {
            true
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
