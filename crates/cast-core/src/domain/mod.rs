//! Pure domain logic: overlay scopes, path validation, and hotkey handling.

pub mod hotkey;
pub mod scope;
