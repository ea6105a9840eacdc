//! Steady GW - stability-gated state sync
//!
//! Polls a noisy key/value text source, only accepts a value after it has
//! been read identically several times in a row, and pushes the resulting
//! state to WebSocket subscribers as one snapshot followed by patches.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod source;
pub mod state;
