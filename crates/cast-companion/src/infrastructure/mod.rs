//! Infrastructure layer: the WebSocket server and the keyboard-hook
//! backend behind the [`KeySource`](crate::application::hotkeys::KeySource)
//! port.

pub mod key_source;
pub mod ws_server;

pub use key_source::ChannelKeySource;
pub use ws_server::{OverlayServer, ServerError, ServerHandle};
