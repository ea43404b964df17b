//! Error types for the session layer.

use gridlock_protocol::PlayerId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The room is at capacity. The new connection is closed without
    /// an ENTER_ROOM reply.
    #[error("room is full")]
    RoomFull,

    /// No record exists for the given player. This happens when an
    /// operation races the player's removal (disconnect or timeout).
    #[error("no record for player {0}")]
    NotFound(PlayerId),
}
