//! Deterministic simulation core for Cryptgate.
//!
//! Everything here is pure state and pure transitions: no clocks, no
//! randomness, no I/O. Time enters as a millisecond counter supplied by
//! the caller, so the same inputs at the same times always produce the
//! same game. The per-room tick task in the server crate owns one
//! [`GameState`], feeds it buffered [`InputFrame`]s once per tick through
//! [`advance`], and copies a [`GameSnapshot`](cryptgate_protocol::GameSnapshot)
//! out for broadcast.
//!
//! # Key types
//!
//! - [`GameState`] — the authoritative state of one room's playthrough
//! - [`PlayerState`] / [`Enemy`] — the entities inside it
//! - [`InputBuffer`] — queued movement/attack intents, applied atomically
//! - [`SimConfig`] — every gameplay tunable in one place
//! - [`advance`] — one simulation tick

mod config;
mod input;
mod spawn;
mod state;
mod tick;

pub use config::SimConfig;
pub use input::{InputBuffer, InputFrame};
pub use state::{Enemy, GameState, PlayerState, RosterEntry, BOSS_WAVE};
pub use tick::advance;
