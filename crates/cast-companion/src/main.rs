//! overlaycast companion — entry point.
//!
//! This binary runs the broadcast engine of the casting companion: it
//! serves browser-based overlay sources over WebSocket, translates match
//! state changes into overlay events, installs the intro hotkeys while an
//! intro overlay is connected, and runs named background duties on the
//! task scheduler.
//!
//! # Usage
//!
//! ```text
//! cast-companion [OPTIONS]
//!
//! Options:
//!   --profile-id   <HEX>    Active profile id; the listening port is this
//!                           value parsed as hex [default: c8d1]
//!   --settings     <PATH>   Settings TOML file [default: settings.toml]
//!   --best-of      <N>      Number of sets in the match [default: 3]
//!   --read-timeout <SECS>   Silence window before a liveness probe [default: 20]
//!   --pong-timeout <SECS>   Probe window before disconnect [default: 10]
//!   --tick         <SECS>   Scheduler tick interval [default: 10]
//! ```
//!
//! # Environment variable overrides
//!
//! Each option can also come from the environment; CLI args win when both
//! are present.
//!
//! | Variable                  | Default         |
//! |---------------------------|-----------------|
//! | `OVERLAYCAST_PROFILE`     | `c8d1`          |
//! | `OVERLAYCAST_SETTINGS`    | `settings.toml` |
//! | `OVERLAYCAST_READ_TIMEOUT`| `20`            |
//! | `OVERLAYCAST_PONG_TIMEOUT`| `10`            |

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cast_companion::application::{
    intro_bindings, spawn_hotkey_supervisor, Broadcaster, ChangeTranslator, ConnectionRegistry,
    HotkeyService, IntroPresenter, TaskScheduler,
};
use cast_companion::domain::{load_settings, InMemoryMatchStore, MatchStore, ServerConfig};
use cast_companion::infrastructure::{ChannelKeySource, OverlayServer};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Live-stream overlay companion: WebSocket state broadcast, intro
/// hotkeys, and background task scheduling.
#[derive(Debug, Parser)]
#[command(
    name = "cast-companion",
    about = "State-broadcast engine for browser-based casting overlays",
    version
)]
struct Cli {
    /// Active profile identifier.  The WebSocket port is this value read
    /// as hexadecimal, so every profile gets a stable loopback port.
    #[arg(long, default_value = "c8d1", env = "OVERLAYCAST_PROFILE")]
    profile_id: String,

    /// Path to the settings TOML file (created with defaults if absent).
    #[arg(long, default_value = "settings.toml", env = "OVERLAYCAST_SETTINGS")]
    settings: PathBuf,

    /// Number of sets in the match.
    #[arg(long, default_value_t = 3, env = "OVERLAYCAST_BEST_OF")]
    best_of: usize,

    /// Seconds an overlay may stay silent before a liveness probe.
    #[arg(long, default_value_t = 20, env = "OVERLAYCAST_READ_TIMEOUT")]
    read_timeout: u64,

    /// Seconds after a probe before the connection is declared dead.
    #[arg(long, default_value_t = 10, env = "OVERLAYCAST_PONG_TIMEOUT")]
    pong_timeout: u64,

    /// Scheduler tick interval in seconds.
    #[arg(long, default_value_t = 10, env = "OVERLAYCAST_TICK")]
    tick: u64,
}

impl Cli {
    /// Builds the server configuration from the CLI arguments.
    ///
    /// # Errors
    ///
    /// Fails when `--profile-id` is not a valid hexadecimal port.
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::for_profile(&self.profile_id)
            .with_context(|| format!("invalid --profile-id '{}'", self.profile_id))?;
        config.read_timeout = Duration::from_secs(self.read_timeout);
        config.pong_timeout = Duration::from_secs(self.pong_timeout);
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.server_config()?;
    let settings = load_settings(&cli.settings)
        .with_context(|| format!("failed to load settings from {}", cli.settings.display()))?;

    info!(
        "overlaycast companion starting — profile {}, listening on {}",
        cli.profile_id, config.bind_addr
    );

    // ── Core wiring ────────────────────────────────────────────────────────────
    //
    // registry + broadcaster → store + translator → intro presenter →
    // hotkey supervisor → WebSocket server.  Everything shares the
    // registry through the broadcaster; nothing else holds network state.
    let (registry, registry_events) = ConnectionRegistry::new_shared();
    let broadcaster = Broadcaster::new(registry.clone());

    let (store, changes) = InMemoryMatchStore::new(settings.clone(), cli.best_of);
    let store: Arc<dyn MatchStore> = store;

    let translator = Arc::new(ChangeTranslator::new(
        broadcaster.clone(),
        Arc::clone(&store),
        settings.clone(),
    ));
    let translator_task = translator.spawn(changes);

    let presenter = IntroPresenter::new(broadcaster.clone(), Arc::clone(&store));

    // The key source is the seam where a platform keyboard hook plugs in.
    let key_source = Arc::new(ChannelKeySource::new());
    let hotkey_service = Arc::new(Mutex::new(HotkeyService::new(key_source)));
    let supervisor_task = spawn_hotkey_supervisor(registry_events, Arc::clone(&hotkey_service), {
        let intros = settings.intros.clone();
        let presenter = Arc::clone(&presenter);
        let broadcaster = broadcaster.clone();
        move || intro_bindings(&intros, &presenter, &broadcaster)
    });

    // ── Background duties ──────────────────────────────────────────────────────
    let mut scheduler = TaskScheduler::new(Duration::from_secs(cli.tick));
    let scheduler_handle = scheduler.handle();
    scheduler.add_task("version_check", {
        let handle = scheduler_handle.clone();
        move || {
            info!(
                "running cast-companion {}",
                env!("CARGO_PKG_VERSION")
            );
            // One-shot: retire after the first run.
            handle.deactivate("version_check")?;
            Ok(())
        }
    })?;
    scheduler_handle.activate("version_check")?;
    scheduler.start();

    // ── Serve until Ctrl+C ─────────────────────────────────────────────────────
    let server = OverlayServer {
        config,
        registry,
        broadcaster,
        store,
        presenter,
    };
    let handle = server.spawn().await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C — initiating graceful shutdown"),
        Err(e) => warn!("failed to listen for Ctrl+C signal: {e}"),
    }

    handle.shutdown().await;
    scheduler.shutdown();
    supervisor_task.abort();
    translator_task.abort();

    info!("overlaycast companion stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
