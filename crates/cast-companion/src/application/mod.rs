//! Application layer: connection registry, broadcaster, task scheduler,
//! hotkey service, intro presenter, and match-change translation.

pub mod broadcaster;
pub mod hotkeys;
pub mod intro;
pub mod registry;
pub mod scheduler;
pub mod translate;

pub use broadcaster::Broadcaster;
pub use hotkeys::{intro_bindings, spawn_hotkey_supervisor, HotkeyAction, HotkeyService};
pub use intro::{IntroPresenter, IntroSlot};
pub use registry::{
    BroadcastTarget, ClientId, Connection, ConnectionCountChanged, ConnectionRegistry,
    OutboundFrame, SharedRegistry,
};
pub use scheduler::{SchedulerError, SchedulerHandle, TaskScheduler};
pub use translate::ChangeTranslator;
