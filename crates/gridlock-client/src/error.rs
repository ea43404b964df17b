//! Error types for the client.

use gridlock_protocol::ProtocolError;
use gridlock_transport::TransportError;

/// Errors that terminate the client.
///
/// Any of these surfacing from [`GameClient::run`](crate::GameClient::run)
/// means the session is over; the process is expected to log and exit.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (dial, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, fatal decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server broke a protocol rule (duplicate player binding,
    /// duplicate roster entry).
    #[error("protocol violation: {0}")]
    Violation(String),

    /// A movement request that isn't a single-axis unit step.
    #[error("invalid movement ({dx}, {dy}): exactly one axis must be ±1")]
    InvalidMovement { dx: i32, dy: i32 },

    /// The server closed the session.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The receiver task died without reporting a typed error.
    #[error("receiver task failed: {0}")]
    ReceiverFailed(String),
}
