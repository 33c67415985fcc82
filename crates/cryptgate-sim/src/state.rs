//! Authoritative game state for one room.

use std::collections::BTreeMap;

use cryptgate_protocol::{
    EnemyId, EnemyKind, EnemySnapshot, Facing, GameSnapshot, GameStatus,
    Phase, PlayerId, PlayerSnapshot, Role, SessionId, Vec2,
};

use crate::SimConfig;

/// Wave counter value while the boss is up. Ordinary waves count 1, 2.
pub const BOSS_WAVE: u32 = 99;

/// X coordinate where players spawn, just off the left wall.
const PLAYER_SPAWN_X: f32 = 60.0;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// One participant's live state. Created at game start, never removed for
/// the rest of the round — a player who disconnects or dies stays in the
/// map at zero health so wave and loss accounting keep working.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub name: String,
    pub role: Role,
    pub pos: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub facing: Facing,
    /// Deadline of the current attack window. The player may swing again
    /// once `now_ms` reaches it; snapshots show the swing until then.
    pub attack_until_ms: u64,
}

impl PlayerState {
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    pub fn is_attacking(&self, now_ms: u64) -> bool {
        now_ms < self.attack_until_ms
    }

    pub fn can_attack(&self, now_ms: u64) -> bool {
        now_ms >= self.attack_until_ms
    }

    fn snapshot(&self, session_id: &SessionId, now_ms: u64) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.player_id,
            session_id: session_id.clone(),
            name: self.name.clone(),
            role: self.role,
            position: self.pos,
            health: self.health,
            max_health: self.max_health,
            is_dead: !self.is_alive(),
            facing: self.facing,
            is_attacking: self.is_attacking(now_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Enemies
// ---------------------------------------------------------------------------

/// A spawned enemy. Removed from the active set at the end of the tick
/// its health reaches zero, never mid-tick.
#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub health: f32,
    pub max_health: f32,
}

impl Enemy {
    fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.id.clone(),
            kind: self.kind,
            position: self.pos,
            health: self.health,
            max_health: self.max_health,
        }
    }
}

/// Per-kind combat profile.
pub(crate) struct KindProfile {
    /// Distance covered per tick while chasing.
    pub speed: f32,
    /// Health drained from the target per tick in contact range.
    pub contact_damage: f32,
    /// Spawn health.
    pub health: f32,
}

/// The fixed tier table: goblins are fast and disposable, orcs tougher,
/// the boss slow, heavy-hitting, and durable.
pub(crate) fn profile(kind: EnemyKind) -> KindProfile {
    match kind {
        EnemyKind::Goblin => KindProfile {
            speed: 2.0,
            contact_damage: 0.5,
            health: 50.0,
        },
        EnemyKind::Orc => KindProfile {
            speed: 1.6,
            contact_damage: 1.0,
            health: 120.0,
        },
        EnemyKind::Boss => KindProfile {
            speed: 1.2,
            contact_damage: 2.0,
            health: 500.0,
        },
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// A lobby player carried into the simulation at game start.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub name: String,
    pub role: Role,
}

/// The full authoritative snapshot for one room. Exclusively owned and
/// mutated by that room's tick task; everyone else sees copies.
#[derive(Debug)]
pub struct GameState {
    /// Keyed and iterated by session id — ordered, so every tick walks
    /// players in the same order.
    pub players: BTreeMap<SessionId, PlayerState>,
    pub enemies: Vec<Enemy>,
    pub width: f32,
    pub height: f32,
    pub status: GameStatus,
    pub wave: u32,
    pub phase: Phase,
    /// Millisecond timestamp (game clock) when the current phase began.
    pub phase_started_ms: u64,
    next_enemy_seq: u64,
}

impl GameState {
    /// Builds the starting state: everyone alive at full health, spawned
    /// at evenly spaced positions along the left edge, facing right, in
    /// the courtyard at wave 0.
    pub fn new(config: &SimConfig, roster: &[RosterEntry]) -> Self {
        let mut players = BTreeMap::new();
        let count = roster.len();
        for (i, entry) in roster.iter().enumerate() {
            let y = config.height * (i + 1) as f32 / (count + 1) as f32;
            players.insert(
                entry.session_id.clone(),
                PlayerState {
                    player_id: entry.player_id,
                    name: entry.name.clone(),
                    role: entry.role,
                    pos: Vec2::new(PLAYER_SPAWN_X, y),
                    health: config.player_max_health,
                    max_health: config.player_max_health,
                    facing: Facing::Right,
                    attack_until_ms: 0,
                },
            );
        }
        Self {
            players,
            enemies: Vec::new(),
            width: config.width,
            height: config.height,
            status: GameStatus::Playing,
            wave: 0,
            phase: Phase::Courtyard,
            phase_started_ms: 0,
            next_enemy_seq: 0,
        }
    }

    /// Mints an enemy id unique within this game.
    pub(crate) fn mint_enemy_id(&mut self) -> EnemyId {
        self.next_enemy_seq += 1;
        EnemyId(format!("E{}-{}", self.wave, self.next_enemy_seq))
    }

    /// Number of players still above zero health.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// Drops a player to zero health in place. Used when a participant
    /// disconnects mid-round; the entry itself stays in the map.
    pub fn mark_dead(&mut self, session_id: &SessionId) {
        if let Some(player) = self.players.get_mut(session_id) {
            player.health = 0.0;
        }
    }

    /// Copies the broadcast view out of the authoritative state.
    pub fn snapshot(&self, now_ms: u64) -> GameSnapshot {
        GameSnapshot {
            players: self
                .players
                .iter()
                .map(|(sid, p)| p.snapshot(sid, now_ms))
                .collect(),
            enemies: self.enemies.iter().map(Enemy::snapshot).collect(),
            projectiles: Vec::new(),
            status: self.status,
            wave: self.wave,
            phase: self.phase,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(n: usize) -> Vec<RosterEntry> {
        (0..n)
            .map(|i| RosterEntry {
                session_id: SessionId(format!("s{i}")),
                player_id: PlayerId(i as i64 + 1),
                name: format!("p{i}"),
                role: [
                    Role::Swordsman,
                    Role::Beast,
                    Role::Archer,
                    Role::Mage,
                    Role::Healer,
                ][i % 5],
            })
            .collect()
    }

    #[test]
    fn test_new_game_starts_in_courtyard_at_wave_zero() {
        let state = GameState::new(&SimConfig::default(), &roster(2));
        assert_eq!(state.phase, Phase::Courtyard);
        assert_eq!(state.wave, 0);
        assert_eq!(state.status, GameStatus::Playing);
        assert!(state.enemies.is_empty());
    }

    #[test]
    fn test_players_spawn_spaced_along_left_edge() {
        let cfg = SimConfig::default();
        let state = GameState::new(&cfg, &roster(3));

        let mut ys: Vec<f32> =
            state.players.values().map(|p| p.pos.y).collect();
        ys.sort_by(|a, b| a.partial_cmp(b).unwrap());

        for player in state.players.values() {
            assert_eq!(player.pos.x, 60.0);
            assert_eq!(player.facing, Facing::Right);
            assert_eq!(player.health, cfg.player_max_health);
        }
        // Evenly spaced: 150, 300, 450 for three players in 600 height.
        assert_eq!(ys, vec![150.0, 300.0, 450.0]);
    }

    #[test]
    fn test_mark_dead_keeps_entry_in_map() {
        let mut state = GameState::new(&SimConfig::default(), &roster(2));
        let sid = SessionId("s0".into());

        state.mark_dead(&sid);

        assert_eq!(state.players.len(), 2, "entry must never be removed");
        assert_eq!(state.players[&sid].health, 0.0);
        assert_eq!(state.alive_count(), 1);
    }

    #[test]
    fn test_snapshot_derives_dead_and_attacking_flags() {
        let mut state = GameState::new(&SimConfig::default(), &roster(2));
        let sid = SessionId("s0".into());
        state.mark_dead(&sid);
        state
            .players
            .get_mut(&SessionId("s1".into()))
            .unwrap()
            .attack_until_ms = 500;

        let snap = state.snapshot(400);
        let p0 = snap.players.iter().find(|p| p.session_id == sid).unwrap();
        assert!(p0.is_dead);

        let p1 = snap
            .players
            .iter()
            .find(|p| p.session_id.0 == "s1")
            .unwrap();
        assert!(p1.is_attacking, "window still open at 400 < 500");

        let later = state.snapshot(500);
        let p1 = later
            .players
            .iter()
            .find(|p| p.session_id.0 == "s1")
            .unwrap();
        assert!(!p1.is_attacking, "window closed at the deadline");
    }

    #[test]
    fn test_snapshot_projectiles_always_empty() {
        let state = GameState::new(&SimConfig::default(), &roster(1));
        assert!(state.snapshot(0).projectiles.is_empty());
    }

    #[test]
    fn test_minted_enemy_ids_are_unique() {
        let mut state = GameState::new(&SimConfig::default(), &roster(1));
        let a = state.mint_enemy_id();
        let b = state.mint_enemy_id();
        assert_ne!(a, b);
    }
}
