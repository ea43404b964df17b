//! Transport abstraction layer for Gridlock.
//!
//! Provides the [`Transport`] and [`Connection`] traits: a
//! connection-oriented, reliable-datagram session model. A session delivers
//! whole messages in order: one envelope per message, no partial reads.
//! The lifecycle engine only ever talks to these traits; swapping the wire
//! (WebSocket today, QUIC or KCP tomorrow) is a change confined to this
//! crate.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConnection, WebSocketTransport, WsClientConnection, WsServerConnection,
};

use std::fmt;
use std::net::SocketAddr;

/// The largest envelope a session will carry, in bytes.
///
/// The defined schema fits comfortably; anything larger is a protocol
/// violation and is rejected on both send and receive.
pub const MAX_ENVELOPE_LEN: usize = 1024;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections (the `Listen`/`Accept` side).
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The local address this transport is bound to.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single session that can send and receive whole envelopes.
///
/// Send and receive must be independently usable from different tasks:
/// a broadcast from the tick task must never wait behind a pending read
/// in the receiver task.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one whole envelope to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next whole envelope from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// The remote peer's address, when the transport knows it.
    fn peer_addr(&self) -> Option<SocketAddr>;
}
