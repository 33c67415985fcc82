//! One simulation tick.
//!
//! Per tick, in order: phase progression, enemy AI, player input
//! (movement and melee), end-of-tick enemy removal, round outcome.
//! Enemies that reach zero health stay in the list until the removal
//! step so combat resolution inside a tick is order-independent.

use std::collections::HashMap;

use cryptgate_protocol::{EnemyKind, Facing, GameStatus, Phase, SessionId, Vec2};

use crate::state::{profile, GameState, BOSS_WAVE};
use crate::{spawn, InputFrame, SimConfig};

/// Advances the game by one tick. `now_ms` is the game clock —
/// milliseconds since the round started, supplied by the caller.
///
/// A finished game (status no longer `Playing`) is never advanced;
/// malformed input (a session the state does not know) is dropped without
/// touching anything else.
pub fn advance(
    state: &mut GameState,
    inputs: &HashMap<SessionId, InputFrame>,
    now_ms: u64,
    config: &SimConfig,
) {
    if state.status != GameStatus::Playing {
        return;
    }
    progress_phase(state, now_ms, config);
    drive_enemies(state, config);
    apply_inputs(state, inputs, now_ms, config);
    state.enemies.retain(|e| e.health > 0.0);
    resolve_outcome(state);
}

// ---------------------------------------------------------------------------
// Phase progression
// ---------------------------------------------------------------------------

/// Courtyard → Dungeon (wave 1) → Dungeon (wave 2) → Boss → Cleared.
/// At most one transition per tick; never backwards, never skipping.
fn progress_phase(state: &mut GameState, now_ms: u64, config: &SimConfig) {
    match state.phase {
        Phase::Courtyard => {
            let door = config.door_position();
            let at_door = state
                .players
                .values()
                .any(|p| p.is_alive() && p.pos.distance_to(door) <= config.door_radius);
            let timed_out = now_ms.saturating_sub(state.phase_started_ms)
                >= config.courtyard_timeout_ms;
            if at_door || timed_out {
                state.phase = Phase::Dungeon;
                state.phase_started_ms = now_ms;
                state.wave = 1;
                spawn::dungeon_wave(state, 1);
                tracing::info!(
                    forced = timed_out && !at_door,
                    "dungeon entered, wave 1 up"
                );
            }
        }
        Phase::Dungeon if state.enemies.is_empty() => {
            if state.wave == 1 {
                state.wave = 2;
                spawn::dungeon_wave(state, 2);
                tracing::info!("wave 1 cleared, wave 2 up");
            } else {
                state.phase = Phase::Boss;
                state.phase_started_ms = now_ms;
                state.wave = BOSS_WAVE;
                spawn::boss(state);
                tracing::info!("dungeon cleared, boss up");
            }
        }
        Phase::Boss if state.enemies.is_empty() => {
            state.phase = Phase::Cleared;
            state.status = GameStatus::Won;
            tracing::info!("boss defeated, game won");
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Enemy AI
// ---------------------------------------------------------------------------

/// Each enemy chases the nearest living player at its kind's speed and
/// drains contact damage while in range. With no living players, enemies
/// hold position. Damage is accumulated and applied after the walk so
/// resolution does not depend on enemy order.
fn drive_enemies(state: &mut GameState, config: &SimConfig) {
    let targets: Vec<(SessionId, Vec2)> = state
        .players
        .iter()
        .filter(|(_, p)| p.is_alive())
        .map(|(sid, p)| (sid.clone(), p.pos))
        .collect();
    if targets.is_empty() {
        return;
    }

    let mut drained: HashMap<SessionId, f32> = HashMap::new();
    for enemy in &mut state.enemies {
        if enemy.health <= 0.0 {
            continue; // cut down this tick, gone at the end of it
        }
        let stats = profile(enemy.kind);
        let (target_sid, target_pos, dist) = targets
            .iter()
            .map(|(sid, pos)| (sid, *pos, enemy.pos.distance_to(*pos)))
            .min_by(|a, b| {
                a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("targets checked non-empty");

        if dist > 0.0 {
            let dir = Vec2::new(
                target_pos.x - enemy.pos.x,
                target_pos.y - enemy.pos.y,
            )
            .normalized();
            enemy.pos.x += dir.x * stats.speed;
            enemy.pos.y += dir.y * stats.speed;
        }
        if dist < config.contact_radius {
            *drained.entry(target_sid.clone()).or_default() +=
                stats.contact_damage;
        }
    }

    for (session_id, damage) in drained {
        if let Some(player) = state.players.get_mut(&session_id) {
            player.health -= damage;
        }
    }
}

// ---------------------------------------------------------------------------
// Player input
// ---------------------------------------------------------------------------

/// Applies one tick of buffered intents: normalized movement clamped to
/// the arena, facing from the horizontal sign, and melee swings gated by
/// the cooldown deadline. Dead players and unknown sessions are ignored.
fn apply_inputs(
    state: &mut GameState,
    inputs: &HashMap<SessionId, InputFrame>,
    now_ms: u64,
    config: &SimConfig,
) {
    // Session order, so simultaneous swings resolve identically every run.
    let mut sessions: Vec<&SessionId> = inputs.keys().collect();
    sessions.sort();

    for session_id in sessions {
        let frame = inputs[session_id];
        let Some(player) = state.players.get_mut(session_id) else {
            tracing::trace!(%session_id, "input for unknown session dropped");
            continue;
        };
        if !player.is_alive() {
            continue;
        }

        let intent = Vec2::new(frame.x, frame.y);
        if intent.length() > 0.0 {
            let dir = intent.normalized();
            player.pos.x = (player.pos.x + dir.x * config.player_speed)
                .clamp(config.wall_margin, state.width - config.wall_margin);
            player.pos.y = (player.pos.y + dir.y * config.player_speed)
                .clamp(config.wall_margin, state.height - config.wall_margin);
            if dir.x > 0.0 {
                player.facing = Facing::Right;
            } else if dir.x < 0.0 {
                player.facing = Facing::Left;
            }
        }

        if frame.attack && player.can_attack(now_ms) {
            player.attack_until_ms = now_ms + config.attack_cooldown_ms;
            let origin = player.pos;
            for enemy in &mut state.enemies {
                if origin.distance_to(enemy.pos) <= config.melee_radius {
                    enemy.health -= if enemy.kind == EnemyKind::Boss {
                        config.boss_melee_damage
                    } else {
                        config.melee_damage
                    };
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Clamps dead players to exactly zero and declares the round lost the
/// tick the last player drops. A win set earlier in the tick stands.
fn resolve_outcome(state: &mut GameState) {
    let mut alive = 0usize;
    for player in state.players.values_mut() {
        if player.health <= 0.0 {
            player.health = 0.0;
        } else {
            alive += 1;
        }
    }
    if alive == 0 && !state.players.is_empty() && state.status == GameStatus::Playing {
        state.status = GameStatus::Lost;
        tracing::info!("party wiped, game lost");
    }
}

// =========================================================================
// Tests
// =========================================================================
