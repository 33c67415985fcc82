//! Room and player repository for Cryptgate.
//!
//! The lobby and simulation layers treat persistence as a plain key-value
//! collaborator: the [`RoomStore`] trait below is the whole contract.
//! [`MemoryStore`] is the in-process implementation; a database-backed one
//! can slot in behind the same trait without touching the game code.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use std::future::Future;

use cryptgate_protocol::{
    Player, PlayerId, Role, Room, RoomId, RoomStatus, SessionId,
};
use rand::Rng;

/// Draft for inserting a new player record. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub room_id: RoomId,
    pub session_id: SessionId,
    pub name: String,
    pub role: Option<Role>,
    pub is_host: bool,
    pub is_ready: bool,
}

/// CRUD contract for room and player records.
///
/// Implementations must be cheap to call from many connection tasks at
/// once; every method is a short, self-contained operation. The returned
/// futures are `Send` because callers run inside spawned tasks (the
/// per-connection handlers and each room's tick loop).
pub trait RoomStore: Send + Sync + 'static {
    /// Creates a room in `Waiting` status with a fresh unique code.
    fn create_room(
        &self,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    fn get_room_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    fn get_room(
        &self,
        id: RoomId,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    fn update_room_status(
        &self,
        id: RoomId,
        status: RoomStatus,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    fn add_player(
        &self,
        draft: NewPlayer,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    fn get_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;

    /// All players in a room, ordered by id (join order).
    fn get_players_in_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send;

    fn update_player_role(
        &self,
        id: PlayerId,
        role: Role,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    fn update_player_ready(
        &self,
        id: PlayerId,
        is_ready: bool,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    fn update_player_host(
        &self,
        id: PlayerId,
        is_host: bool,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    /// Removes the player owning `session_id`. Unknown sessions are a
    /// silent no-op — disconnect cleanup may race an earlier removal.
    fn remove_player(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_player_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;
}

/// Mints a fresh session identifier: 32 hex characters, 128 bits of
/// entropy. Guessing another player's live token is infeasible.
pub fn new_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
