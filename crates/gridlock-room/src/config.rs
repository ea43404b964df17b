//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a room. Set once before the server starts, immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Server tick rate in Hz.
    pub tick_rate: u32,

    /// The lobby size. The game starts only when exactly this many
    /// players are admitted, synced, and loaded.
    pub max_players: usize,

    /// Time-sync rounds each client must complete before the game can
    /// leave the lobby phase.
    pub time_sync_target: i32,

    /// Delay between START_GAME broadcast and the appointed start instant.
    pub appointed_delay: Duration,

    /// Grid dimensions. Spawn positions are drawn from the interior
    /// (the outermost ring is excluded).
    pub map_width: i32,
    pub map_height: i32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_rate: 50,
            max_players: 2,
            time_sync_target: 10,
            appointed_delay: Duration::from_secs(3),
            map_width: 10,
            map_height: 10,
        }
    }
}

impl RoomConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - `tick_rate` clamped to `1..=128` (the scheduler's range).
    /// - `max_players` raised to at least 1.
    /// - Map dimensions raised to at least 1.
    pub fn validated(mut self) -> Self {
        if self.tick_rate == 0 || self.tick_rate > 128 {
            tracing::warn!(rate = self.tick_rate, "tick_rate out of range, clamping");
            self.tick_rate = self.tick_rate.clamp(1, 128);
        }
        if self.max_players == 0 {
            tracing::warn!("max_players must be at least 1, raising");
            self.max_players = 1;
        }
        self.map_width = self.map_width.max(1);
        self.map_height = self.map_height.max(1);
        self
    }

    /// Ticks between WORLD_SYNC broadcasts: `tick_rate / 2`, i.e. roughly
    /// every half second of wall time.
    pub fn world_sync_period(&self) -> u32 {
        (self.tick_rate / 2).max(1)
    }
}
