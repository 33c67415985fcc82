//! Wire protocol for Cryptgate.
//!
//! This crate defines everything that travels between the game client and
//! the server, plus the shared records both sides agree on:
//!
//! - **Types** ([`Room`], [`Player`], [`Role`], identity newtypes) — the
//!   persisted records as they appear on the wire.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`GameSnapshot`]) —
//!   the tagged JSON frames exchanged over the socket.
//! - **Codec** ([`encode`], [`decode`]) — JSON framing helpers.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while framing.
//!
//! The protocol layer knows nothing about connections, rooms, or the
//! simulation — it only defines shapes and how to (de)serialize them.

mod codec;
mod error;
mod message;
mod types;

#[cfg(feature = "json")]
pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use message::{
    ClientMessage, EnemySnapshot, GameSnapshot, PlayerSnapshot,
    ProjectileSnapshot, ServerMessage,
};
pub use types::{
    EnemyId, EnemyKind, Facing, GameStatus, Phase, Player, PlayerId, Role,
    Room, RoomId, RoomStatus, SessionId, Vec2, ROLES,
};
