//! Shared record and identity types.
//!
//! These are the structures both the server and the canvas client agree on:
//! persisted room/player records (as they appear in `room_update` frames),
//! the closed role set, and the enums that describe a running game.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room's persisted identity.
///
/// `#[serde(transparent)]` keeps the JSON form a plain number, matching
/// what the client expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A player's persisted identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The opaque token that correlates a socket to a participant across
/// reconnects. Issued by the server when a player record is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An enemy's ephemeral identity, minted by the wave spawner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnemyId(pub String);

impl fmt::Display for EnemyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The closed set of playable roles. Each player in a room holds a
/// distinct role once the game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Swordsman,
    Beast,
    Archer,
    Mage,
    Healer,
}

/// All roles, in display order.
pub const ROLES: [Role; 5] = [
    Role::Swordsman,
    Role::Beast,
    Role::Archer,
    Role::Mage,
    Role::Healer,
];

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Swordsman => "swordsman",
            Role::Beast => "beast",
            Role::Archer => "archer",
            Role::Mage => "mage",
            Role::Healer => "healer",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// Lifecycle status of a persisted room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Waiting => write!(f, "waiting"),
            RoomStatus::Playing => write!(f, "playing"),
            RoomStatus::Finished => write!(f, "finished"),
        }
    }
}

/// A persisted room record, as it appears in `room_update` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Short human-typeable join code, unique among live rooms.
    pub code: String,
    pub status: RoomStatus,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

/// A persisted player record.
///
/// `role` stays `None` until the player picks one in the lobby; `is_host`
/// is true for exactly one player per room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(rename = "roomId")]
    pub room_id: RoomId,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    pub name: String,
    pub role: Option<Role>,
    #[serde(rename = "isHost")]
    pub is_host: bool,
    #[serde(rename = "isReady")]
    pub is_ready: bool,
}

// ---------------------------------------------------------------------------
// Game enums
// ---------------------------------------------------------------------------

/// Overall status of one playthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Playing,
    Won,
    Lost,
}

/// The stage a playthrough is in. Strictly ordered — a game never skips
/// a phase or moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Courtyard,
    Dungeon,
    Boss,
    Cleared,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Courtyard => write!(f, "courtyard"),
            Phase::Dungeon => write!(f, "dungeon"),
            Phase::Boss => write!(f, "boss"),
            Phase::Cleared => write!(f, "cleared"),
        }
    }
}

/// Enemy tiers. Goblins are fast and weak, orcs tougher and slower,
/// the boss slowest of all but resistant to melee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyKind {
    Goblin,
    Orc,
    Boss,
}

/// Which way a player sprite faces. Purely vertical movement does not
/// change facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    Right,
}

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// A 2D position or direction, serialized as `{"x": ..., "y": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit-length copy of this vector, or zero if the vector is zero.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len > 0.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        Vec2::new(other.x - self.x, other.y - self.y).length()
    }
}

// =========================================================================
// Tests
// =========================================================================
