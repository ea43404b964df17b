//! The player registry: tracks every admitted session.
//!
//! This is the central piece of the session layer. It owns the
//! [`PlayerRecord`]s, allocates ids, enforces max occupancy at admission,
//! answers the roster questions the room state machine asks each tick
//! (everyone synced? everyone ready?), and fans broadcasts out to every
//! connected player.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is NOT thread-safe by itself: it's a plain `HashMap`
//! behind whatever lock the server chooses (a `tokio::sync::Mutex` in the
//! facade). Keeping the locking out of this crate means every mutation
//! path (acceptor, per-session receivers, heartbeat sweep, tick task)
//! serializes through one lock, which is exactly the ordering guarantee
//! the lifecycle engine needs.

use std::collections::HashMap;
use std::sync::Arc;

use gridlock_protocol::{GridPos, PlayerId};
use gridlock_transport::Connection;

use crate::{PlayerRecord, SessionError};

/// Tracks all admitted players, keyed by id.
pub struct PlayerRegistry<C> {
    players: HashMap<PlayerId, PlayerRecord<C>>,
    next_id: i32,
    max_players: usize,
}

impl<C: Connection> PlayerRegistry<C> {
    /// Creates an empty registry admitting at most `max_players` players.
    pub fn new(max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            next_id: 1,
            max_players,
        }
    }

    /// Admits a new session, allocating the next player id.
    ///
    /// # Errors
    /// Returns [`SessionError::RoomFull`] at capacity; the caller closes
    /// the connection without sending ENTER_ROOM.
    pub fn admit(&mut self, connection: Arc<C>, now_ms: i64) -> Result<PlayerId, SessionError> {
        if self.players.len() >= self.max_players {
            return Err(SessionError::RoomFull);
        }

        let id = PlayerId(self.next_id);
        self.next_id += 1;
        self.players
            .insert(id, PlayerRecord::new(id, connection, now_ms));

        tracing::info!(player_id = %id, players = self.players.len(), "player admitted");
        Ok(id)
    }

    /// Records activity on a player's session. Called on every successful
    /// read, so `last_active_ms` is non-decreasing until removal.
    pub fn touch(&mut self, id: PlayerId, now_ms: i64) -> Result<(), SessionError> {
        let record = self.record_mut(id)?;
        if now_ms > record.last_active_ms {
            record.last_active_ms = now_ms;
        }
        Ok(())
    }

    /// Counts a completed time-sync round, saturating at `target`.
    /// Returns the updated count.
    pub fn record_time_sync(&mut self, id: PlayerId, target: i32) -> Result<i32, SessionError> {
        let record = self.record_mut(id)?;
        if record.time_synced < target {
            record.time_synced += 1;
        }
        Ok(record.time_synced)
    }

    /// Marks a player ready (GAME_LOADED received). One-way: a ready
    /// player never becomes unready.
    pub fn mark_ready(&mut self, id: PlayerId) -> Result<(), SessionError> {
        let record = self.record_mut(id)?;
        if !record.is_ready {
            record.is_ready = true;
            tracing::debug!(player_id = %id, "player ready");
        }
        Ok(())
    }

    /// Stores the player's assigned starting position.
    pub fn set_position(&mut self, id: PlayerId, position: GridPos) -> Result<(), SessionError> {
        self.record_mut(id)?.position = position;
        Ok(())
    }

    /// Removes a player's record, returning it so the caller can close
    /// the session.
    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerRecord<C>> {
        let record = self.players.remove(&id);
        if record.is_some() {
            tracing::info!(player_id = %id, players = self.players.len(), "player removed");
        }
        record
    }

    /// Looks up a player's record.
    pub fn get(&self, id: PlayerId) -> Option<&PlayerRecord<C>> {
        self.players.get(&id)
    }

    /// The ids of all admitted players, sorted for deterministic iteration.
    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    /// All live sessions (used at shutdown to unblock receivers).
    pub fn connections(&self) -> Vec<Arc<C>> {
        self.players
            .values()
            .map(|r| Arc::clone(&r.connection))
            .collect()
    }

    /// Number of admitted players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if there are no players.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Whether the room is at capacity.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Whether every admitted player completed `target` time-sync rounds.
    /// Vacuously true when empty; pair with an occupancy check.
    pub fn all_time_synced(&self, target: i32) -> bool {
        self.players.values().all(|p| p.time_synced >= target)
    }

    /// Whether every admitted player reported GAME_LOADED.
    pub fn all_ready(&self) -> bool {
        self.players.values().all(|p| p.is_ready)
    }

    /// Players whose sessions have been silent past the timeout:
    /// `now − last_active > 2 · heartbeat_interval`.
    pub fn stale_ids(&self, now_ms: i64, heartbeat_interval_ms: i64) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| now_ms - p.last_active_ms > 2 * heartbeat_interval_ms)
            .map(|p| p.id)
            .collect()
    }

    /// Sends `data` to every admitted player, in id order.
    ///
    /// Per-player send failures are logged and skipped; the failing
    /// session's own receiver will notice the broken pipe and clean up.
    pub async fn broadcast(&self, data: &[u8]) {
        let mut records: Vec<&PlayerRecord<C>> = self.players.values().collect();
        records.sort_by_key(|r| r.id);
        for record in records {
            if let Err(e) = record.connection.send(data).await {
                tracing::warn!(player_id = %record.id, error = %e, "broadcast send failed");
            }
        }
    }

    fn record_mut(&mut self, id: PlayerId) -> Result<&mut PlayerRecord<C>, SessionError> {
        self.players.get_mut(&id).ok_or(SessionError::NotFound(id))
    }
}

// =========================================================================
// Tests
// =========================================================================
