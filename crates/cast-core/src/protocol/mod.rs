//! The overlay wire protocol: JSON message shape and event names.

pub mod messages;
