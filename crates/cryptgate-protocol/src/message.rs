//! The wire messages themselves.
//!
//! Every frame is a tagged JSON object: `{"type": "...", "payload": ...}`.
//! Type tags are snake_case and payload keys camelCase — the shapes the
//! canvas client was written against.

use serde::{Deserialize, Serialize};

use crate::types::{
    EnemyId, EnemyKind, Facing, GameStatus, Phase, Player, PlayerId, Role,
    Room, RoomId, SessionId, Vec2,
};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Everything a client may send over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room by code. A known `sessionId` re-binds the connection to
    /// its existing player instead of creating a new one.
    Join {
        code: String,
        name: String,
        #[serde(
            default,
            rename = "sessionId",
            skip_serializing_if = "Option::is_none"
        )]
        session_id: Option<SessionId>,
    },

    /// Pick (or change) a role in the lobby.
    SelectRole { role: Role },

    /// Toggle the ready flag.
    Ready {
        #[serde(rename = "isReady")]
        is_ready: bool,
    },

    /// Host-only manual start.
    StartGame,

    /// Per-frame movement intent and attack trigger. The intent vector is
    /// not required to be pre-normalized.
    Input { x: f32, y: f32, attack: bool },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Everything the server may send over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The connection's own identity, sent once after a successful join.
    Joined {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },

    /// Full lobby roster, broadcast after every successful lobby mutation.
    RoomUpdate { players: Vec<Player>, room: Room },

    /// Authoritative game snapshot, broadcast once per simulation tick.
    GameState(GameSnapshot),

    /// A rejected action or lookup failure, sent only to the requester.
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Snapshot payloads
// ---------------------------------------------------------------------------

/// One player's visible state inside a `game_state` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    pub name: String,
    pub role: Role,
    pub position: Vec2,
    pub health: f32,
    #[serde(rename = "maxHealth")]
    pub max_health: f32,
    #[serde(rename = "isDead")]
    pub is_dead: bool,
    pub facing: Facing,
    #[serde(rename = "isAttacking")]
    pub is_attacking: bool,
}

/// One enemy's visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: EnemyId,
    #[serde(rename = "type")]
    pub kind: EnemyKind,
    pub position: Vec2,
    pub health: f32,
    #[serde(rename = "maxHealth")]
    pub max_health: f32,
}

/// Reserved for ranged attacks; the current combat model is melee-only,
/// so this array is always empty on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: String,
    pub position: Vec2,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The full per-tick snapshot of one room's game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub status: GameStatus,
    pub wave: u32,
    pub phase: Phase,
}

// =========================================================================
// Tests
// =========================================================================
