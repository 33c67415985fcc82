//! Wave and boss spawning.
//!
//! Spawn points are fixed: enemies enter in a line along the right wall,
//! mirroring the players' left-edge spawn. No randomness — identical
//! playthroughs place identical enemies.

use cryptgate_protocol::{EnemyKind, Vec2};

use crate::state::{profile, Enemy, GameState};

/// X coordinate where enemies enter, just off the right wall.
const ENEMY_SPAWN_X_INSET: f32 = 40.0;

/// First dungeon wave: many weak goblins.
const WAVE_ONE_COUNT: usize = 6;

/// Second dungeon wave: fewer but tougher orcs.
const WAVE_TWO_COUNT: usize = 4;

/// Spawns the numbered dungeon wave into the state.
pub(crate) fn dungeon_wave(state: &mut GameState, wave: u32) {
    let (kind, count) = match wave {
        1 => (EnemyKind::Goblin, WAVE_ONE_COUNT),
        _ => (EnemyKind::Orc, WAVE_TWO_COUNT),
    };
    spawn_line(state, kind, count);
    tracing::debug!(wave, count, ?kind, "wave spawned");
}

/// Spawns the single boss at the middle of the right wall.
pub(crate) fn boss(state: &mut GameState) {
    let stats = profile(EnemyKind::Boss);
    let pos = Vec2::new(state.width - 80.0, state.height / 2.0);
    let id = state.mint_enemy_id();
    state.enemies.push(Enemy {
        id,
        kind: EnemyKind::Boss,
        pos,
        health: stats.health,
        max_health: stats.health,
    });
    tracing::debug!("boss spawned");
}

fn spawn_line(state: &mut GameState, kind: EnemyKind, count: usize) {
    let stats = profile(kind);
    let x = state.width - ENEMY_SPAWN_X_INSET;
    for i in 0..count {
        let y = state.height * (i + 1) as f32 / (count + 1) as f32;
        let id = state.mint_enemy_id();
        state.enemies.push(Enemy {
            id,
            kind,
            pos: Vec2::new(x, y),
            health: stats.health,
            max_health: stats.health,
        });
    }
}
