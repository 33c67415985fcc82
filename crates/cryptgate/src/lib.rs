//! # Cryptgate
//!
//! Authoritative real-time server for a small co-op dungeon crawl.
//!
//! Players join a room by short code over a WebSocket, pick distinct
//! roles, ready up, and the server then runs the whole game: one
//! fixed-rate simulation task per active room, with every tick's state
//! broadcast to exactly that room's connections. Clients only ever send
//! intent; the server is the single source of truth.
//!
//! ## Layers
//!
//! - [`LobbyService`] — join/role/ready/start state machine (pre-game)
//! - [`RoomSupervisor`] — owns every running simulation task
//! - [`Server`] / [`ServerBuilder`] — WebSocket listener and wiring
//!
//! ```rust,no_run
//! use cryptgate::ServerBuilder;
//! use cryptgate_store::MemoryStore;
//!
//! # async fn run() -> Result<(), cryptgate::CryptgateError> {
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(MemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod lobby;
mod server;
mod supervisor;

pub use error::CryptgateError;
pub use lobby::{LobbyError, LobbyService, MAX_PLAYERS};
pub use server::{Server, ServerBuilder, ServerState};
pub use supervisor::{RoomSupervisor, SimCommand, SimHandle};
