//! Core type definitions used across the webchat workspace.

pub mod name;

pub use name::{Nick, RoomName, MAX_NAME_LEN};
