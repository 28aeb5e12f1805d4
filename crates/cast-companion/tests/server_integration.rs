//! End-to-end tests over a real WebSocket server on an ephemeral port:
//! connect lifecycle, scope broadcasting, the intro acknowledgment echo,
//! and the liveness probe.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use cast_companion::application::{
    Broadcaster, ChangeTranslator, ConnectionRegistry, IntroPresenter, IntroSlot, SharedRegistry,
};
use cast_companion::domain::{
    InMemoryMatchStore, MatchStore, ServerConfig, Settings, COLOR_WIN,
};
use cast_companion::infrastructure::{OverlayServer, ServerHandle};
use cast_core::Scope;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Stack {
    handle: ServerHandle,
    store: Arc<InMemoryMatchStore>,
    presenter: Arc<IntroPresenter>,
    registry: SharedRegistry,
}

async fn start_stack(config: ServerConfig) -> Stack {
    let (registry, _events) = ConnectionRegistry::new_shared();
    let broadcaster = Broadcaster::new(registry.clone());

    let (store, changes) = InMemoryMatchStore::new(Settings::default(), 3);
    let dyn_store: Arc<dyn MatchStore> = store.clone();

    let translator = Arc::new(ChangeTranslator::new(
        broadcaster.clone(),
        Arc::clone(&dyn_store),
        Settings::default(),
    ));
    translator.spawn(changes);

    let presenter = IntroPresenter::new(broadcaster.clone(), Arc::clone(&dyn_store));

    let server = OverlayServer {
        config,
        registry: registry.clone(),
        broadcaster,
        store: dyn_store,
        presenter: Arc::clone(&presenter),
    };
    let handle = server.spawn().await.expect("server must bind port 0");

    Stack {
        handle,
        store,
        presenter,
        registry,
    }
}

fn ephemeral_config() -> ServerConfig {
    ServerConfig {
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        ..ServerConfig::default()
    }
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("client connect");
    ws
}

/// Receives frames until the next text frame, parsed as JSON.
async fn recv_json(ws: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("frame error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("valid JSON frame");
        }
    }
}

fn scope_count(registry: &SharedRegistry, scope: Scope) -> usize {
    registry.lock().unwrap().count(scope)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 2 seconds");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_score_client_receives_all_data_on_connect() {
    let stack = start_stack(ephemeral_config()).await;
    stack.store.set_team(0, "Alpha");
    stack.store.set_solo(false);

    let mut client = connect(stack.handle.local_addr(), "/score").await;
    let frame = recv_json(&mut client).await;

    assert_eq!(frame["event"], "ALL_DATA");
    assert_eq!(frame["data"]["teams"][0], "Alpha");
    assert!(!frame["state"].as_str().unwrap().is_empty());

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_intro_client_gets_no_initial_snapshot() {
    let stack = start_stack(ephemeral_config()).await;
    let mut client = connect(stack.handle.local_addr(), "/intro").await;

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Intro) == 1).await;
    let got_frame = timeout(Duration::from_millis(300), client.next()).await;
    assert!(got_frame.is_err(), "intro scope must stay quiet on connect");

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_score_update_reaches_both_variant_paths() {
    let stack = start_stack(ephemeral_config()).await;
    let addr = stack.handle.local_addr();
    let mut plain = connect(addr, "/score").await;
    let mut variant = connect(addr, "/score_[0-1]").await;

    // Both paths are score scope, so both start with the snapshot.
    assert_eq!(recv_json(&mut plain).await["event"], "ALL_DATA");
    assert_eq!(recv_json(&mut variant).await["event"], "ALL_DATA");

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Score) == 2).await;
    stack.store.set_winner(0, Some(0));

    for client in [&mut plain, &mut variant] {
        // First a score text, then the icon recolor for team 1.
        let text = recv_json(client).await;
        assert_eq!(text["event"], "CHANGE_TEXT");
        assert_eq!(text["data"]["id"], "score1");
        assert_eq!(text["data"]["text"], "1");

        let icon = recv_json(client).await;
        assert_eq!(icon["event"], "CHANGE_SCORE");
        assert_eq!(icon["data"]["teamid"], 1);
        assert_eq!(icon["data"]["setid"], 1);
        assert_eq!(icon["data"]["color"], COLOR_WIN);
    }

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_invalid_path_is_dropped_without_registration() {
    let stack = start_stack(ephemeral_config()).await;
    let mut client = connect(stack.handle.local_addr(), "/banner").await;

    // The handshake succeeds but the server closes immediately.
    let end = timeout(Duration::from_secs(2), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok(), "server must drop the invalid-path connection");
    assert_eq!(scope_count(&stack.registry, Scope::Score), 0);
    assert_eq!(scope_count(&stack.registry, Scope::Intro), 0);

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_intro_echo_acknowledges_and_advances_round_robin() {
    let stack = start_stack(ephemeral_config()).await;
    stack.store.set_player(0, 0, "alpha");
    let mut client = connect(stack.handle.local_addr(), "/intro").await;

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Intro) == 1).await;

    stack.presenter.show(IntroSlot::RoundRobin);
    let frame = recv_json(&mut client).await;
    assert_eq!(frame["event"], "SHOW_INTRO");
    assert_eq!(frame["data"]["name"], "alpha");

    // Echo the correlation token back, as the overlay does when its
    // animation finishes.
    let token = frame["state"].as_str().unwrap().to_string();
    client.send(Message::Text(token)).await.unwrap();

    let presenter = Arc::clone(&stack.presenter);
    wait_until(move || presenter.pending_token().is_none()).await;
    assert_eq!(stack.presenter.round_robin_slot(), 1);

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_stale_echo_leaves_pending_intro_untouched() {
    let stack = start_stack(ephemeral_config()).await;
    let mut client = connect(stack.handle.local_addr(), "/intro").await;

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Intro) == 1).await;

    let stale = stack.presenter.show(IntroSlot::Player(0));
    let fresh = stack.presenter.show(IntroSlot::Player(1));
    recv_json(&mut client).await;
    recv_json(&mut client).await;

    client.send(Message::Text(stale)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stack.presenter.pending_token(), Some(fresh));

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_unregisters_the_connection() {
    let stack = start_stack(ephemeral_config()).await;
    let mut client = connect(stack.handle.local_addr(), "/score").await;
    recv_json(&mut client).await; // the snapshot

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Score) == 1).await;

    client.close(None).await.unwrap();
    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Score) == 0).await;

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_silent_client_receives_liveness_probe() {
    let stack = start_stack(ServerConfig {
        read_timeout: Duration::from_millis(100),
        pong_timeout: Duration::from_millis(500),
        ..ephemeral_config()
    })
    .await;
    let mut client = connect(stack.handle.local_addr(), "/intro").await;

    let probed = timeout(Duration::from_secs(2), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Ping(_))) => break true,
                Some(Ok(_)) => {}
                _ => break false,
            }
        }
    })
    .await
    .expect("no probe within 2 seconds");
    assert!(probed, "silent connection must be pinged");

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_unresponsive_client_is_disconnected_after_pong_window() {
    let stack = start_stack(ServerConfig {
        read_timeout: Duration::from_millis(100),
        pong_timeout: Duration::from_millis(100),
        ..ephemeral_config()
    })
    .await;

    // Never polled, so nothing ever answers the probe.
    let _client = connect(stack.handle.local_addr(), "/intro").await;
    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Intro) == 1).await;

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Intro) == 0).await;
    assert_eq!(scope_count(&stack.registry, Scope::Intro), 0);

    stack.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_sessions() {
    let stack = start_stack(ephemeral_config()).await;
    let mut client = connect(stack.handle.local_addr(), "/intro").await;

    let registry = stack.registry.clone();
    wait_until(move || scope_count(&registry, Scope::Intro) == 1).await;

    // Keep the client polling so it can complete the close handshake.
    let reader = tokio::spawn(async move {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) => break true,
                Some(Ok(_)) => {}
                _ => break false,
            }
        }
    });

    timeout(Duration::from_secs(2), stack.handle.shutdown())
        .await
        .expect("shutdown must drain open sessions promptly");

    let saw_close = timeout(Duration::from_secs(2), reader)
        .await
        .expect("no close frame within 2 seconds")
        .expect("client reader task");
    assert!(saw_close, "open session must receive a close on shutdown");
    assert_eq!(scope_count(&stack.registry, Scope::Intro), 0);
}
