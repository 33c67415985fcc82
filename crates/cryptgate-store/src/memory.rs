//! In-memory [`RoomStore`] implementation.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use cryptgate_protocol::{
    Player, PlayerId, Role, Room, RoomId, RoomStatus, SessionId,
};
use rand::Rng;
use tokio::sync::Mutex;

use crate::{NewPlayer, RoomStore, StoreError};

/// Characters used in room codes. Uppercase alphanumerics only — codes
/// are read aloud and typed on phones.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a room code.
const CODE_LEN: usize = 4;

/// An in-process repository backed by ordered maps.
///
/// All state lives behind a single async mutex; every operation locks,
/// touches the maps, and releases. Nothing is held across an await.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_room_id: i64,
    next_player_id: i64,
    /// BTreeMap keeps iteration in id order, which doubles as join order.
    rooms: BTreeMap<RoomId, Room>,
    players: BTreeMap<PlayerId, Player>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolls codes until one misses every existing code.
fn fresh_code(existing: &BTreeMap<RoomId, Room>) -> String {
    let mut rng = rand::rng();
    loop {
        let code: String = (0..CODE_LEN)
            .map(|_| {
                CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char
            })
            .collect();
        if !existing.values().any(|room| room.code == code) {
            return code;
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl RoomStore for MemoryStore {
    async fn create_room(&self) -> Result<Room, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_room_id += 1;
        let room = Room {
            id: RoomId(inner.next_room_id),
            code: fresh_code(&inner.rooms),
            status: RoomStatus::Waiting,
            created_at: unix_millis(),
        };
        inner.rooms.insert(room.id, room.clone());
        tracing::info!(room_id = %room.id, code = %room.code, "room created");
        Ok(room)
    }

    async fn get_room_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Room>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rooms.values().find(|r| r.code == code).cloned())
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rooms.get(&id).cloned())
    }

    async fn update_room_status(
        &self,
        id: RoomId,
        status: RoomStatus,
    ) -> Result<Room, StoreError> {
        let mut inner = self.inner.lock().await;
        let room = inner
            .rooms
            .get_mut(&id)
            .ok_or(StoreError::RoomNotFound(id))?;
        room.status = status;
        Ok(room.clone())
    }

    async fn add_player(&self, draft: NewPlayer) -> Result<Player, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.rooms.contains_key(&draft.room_id) {
            return Err(StoreError::RoomNotFound(draft.room_id));
        }
        inner.next_player_id += 1;
        let player = Player {
            id: PlayerId(inner.next_player_id),
            room_id: draft.room_id,
            session_id: draft.session_id,
            name: draft.name,
            role: draft.role,
            is_host: draft.is_host,
            is_ready: draft.is_ready,
        };
        inner.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn get_player(
        &self,
        id: PlayerId,
    ) -> Result<Option<Player>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.players.get(&id).cloned())
    }

    async fn get_players_in_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<Player>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .players
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn update_player_role(
        &self,
        id: PlayerId,
        role: Role,
    ) -> Result<Player, StoreError> {
        let mut inner = self.inner.lock().await;
        let player = inner
            .players
            .get_mut(&id)
            .ok_or(StoreError::PlayerNotFound(id))?;
        player.role = Some(role);
        Ok(player.clone())
    }

    async fn update_player_ready(
        &self,
        id: PlayerId,
        is_ready: bool,
    ) -> Result<Player, StoreError> {
        let mut inner = self.inner.lock().await;
        let player = inner
            .players
            .get_mut(&id)
            .ok_or(StoreError::PlayerNotFound(id))?;
        player.is_ready = is_ready;
        Ok(player.clone())
    }

    async fn update_player_host(
        &self,
        id: PlayerId,
        is_host: bool,
    ) -> Result<Player, StoreError> {
        let mut inner = self.inner.lock().await;
        let player = inner
            .players
            .get_mut(&id)
            .ok_or(StoreError::PlayerNotFound(id))?;
        player.is_host = is_host;
        Ok(player.clone())
    }

    async fn remove_player(
        &self,
        session_id: &SessionId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner
            .players
            .values()
            .find(|p| &p.session_id == session_id)
            .map(|p| p.id);
        if let Some(id) = id {
            inner.players.remove(&id);
        }
        Ok(())
    }

    async fn get_player_by_session_id(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Player>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .players
            .values()
            .find(|p| &p.session_id == session_id)
            .cloned())
    }
}

// =========================================================================
// Tests
// =========================================================================
