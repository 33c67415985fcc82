//! Gameplay configuration.

use std::time::Duration;

use cryptgate_protocol::Vec2;

/// Every gameplay tunable in one place.
///
/// The defaults are the shipped balance; tests override individual fields
/// to force specific situations (instant courtyard timeout, zero attack
/// cooldown, and so on).
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Simulation tick rate in Hz.
    pub tick_rate_hz: u32,

    /// Arena dimensions in world units.
    pub width: f32,
    pub height: f32,

    /// Players are clamped to `[wall_margin, width - wall_margin]` on x
    /// and the equivalent on y.
    pub wall_margin: f32,

    /// Distance a player covers per tick at full intent.
    pub player_speed: f32,

    /// Starting and maximum player health.
    pub player_max_health: f32,

    /// How long an accepted attack locks out the next one. The attacking
    /// flag on snapshots is true for exactly this window.
    pub attack_cooldown_ms: u64,

    /// Reach of a melee swing, measured from the player's position.
    pub melee_radius: f32,

    /// Damage per swing to goblins and orcs.
    pub melee_damage: f32,

    /// Damage per swing to the boss. Lower on purpose — the boss fight
    /// is meant to outlast a single rotation of cooldowns.
    pub boss_melee_damage: f32,

    /// Distance at which an enemy starts draining its target.
    pub contact_radius: f32,

    /// How long the courtyard lasts before the dungeon opens regardless
    /// of where the players are standing.
    pub courtyard_timeout_ms: u64,

    /// Players within this distance of the door trigger the dungeon.
    pub door_radius: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            width: 800.0,
            height: 600.0,
            wall_margin: 20.0,
            player_speed: 5.0,
            player_max_health: 100.0,
            attack_cooldown_ms: 200,
            melee_radius: 60.0,
            melee_damage: 20.0,
            boss_melee_damage: 10.0,
            contact_radius: 30.0,
            courtyard_timeout_ms: 30_000,
            door_radius: 80.0,
        }
    }
}

impl SimConfig {
    /// Duration of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    /// The courtyard door, set into the right wall of the arena.
    pub fn door_position(&self) -> Vec2 {
        Vec2::new(self.width - 110.0, self.height / 2.0)
    }
}
