//! The per-player record: the server's view of one admitted session.

use std::sync::Arc;

use gridlock_protocol::{GridPos, PlayerId};

/// The server's record of one admitted player.
///
/// Created by [`PlayerRegistry::admit`](crate::PlayerRegistry::admit),
/// destroyed on disconnect or heartbeat timeout. The id is never reused
/// while the server lives.
///
/// Field invariants, maintained by the registry:
/// - `last_active_ms` is non-decreasing until the record is removed.
/// - `time_synced` never exceeds the configured target.
/// - `is_ready` only transitions false → true.
#[derive(Debug)]
pub struct PlayerRecord<C> {
    /// The player's unique id (monotonic from 1).
    pub id: PlayerId,

    /// The session this player is reachable on. Shared with the player's
    /// receiver task; the registry's copy is what broadcasts use.
    pub connection: Arc<C>,

    /// Clock reading of the last successful read from this session.
    pub last_active_ms: i64,

    /// Completed time-sync rounds, saturating at the configured target.
    pub time_synced: i32,

    /// Whether the player reported GAME_LOADED.
    pub is_ready: bool,

    /// Starting position assigned when the room leaves the lobby phase.
    pub position: GridPos,
}

impl<C> PlayerRecord<C> {
    pub(crate) fn new(id: PlayerId, connection: Arc<C>, now_ms: i64) -> Self {
        Self {
            id,
            connection,
            last_active_ms: now_ms,
            time_synced: 0,
            is_ready: false,
            position: GridPos::ORIGIN,
        }
    }
}
