//! # Gridlock
//!
//! Authoritative real-time multiplayer coordinator with lockstep input
//! relay.
//!
//! A Gridlock server mediates a fixed-size lobby through a disciplined
//! lifecycle: admission → time synchronization → simultaneous load →
//! countdown to a globally agreed start instant → lockstep input relay
//! with periodic world-sync frames. The server owns the clock and the
//! roster; clients replicate game state locally by executing the relayed
//! inputs (see the `gridlock-client` crate).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridlock::prelude::*;
//!
//! # async fn run() -> Result<(), GridlockError> {
//! let server = GridlockServerBuilder::new()
//!     .bind("0.0.0.0:12345")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::GridlockError;
pub use server::{GridlockServer, GridlockServerBuilder, ServerConfig, ShutdownHandle};

/// One-stop imports for server binaries and tests.
pub mod prelude {
    pub use crate::{
        GridlockError, GridlockServer, GridlockServerBuilder, ServerConfig, ShutdownHandle,
    };
    pub use gridlock_protocol::{
        BinaryCodec, ClientMessage, Codec, CommandKind, EnterRoomBody, GridPos, PlayerId,
        PlayerInputBody, PlayerSpawn, ResponseTimeBody, ServerFrame, ServerMessage,
        StartEnterGameBody, StartGameBody, Status, WorldSyncBody, decode_client, decode_server,
        encode_client, encode_server,
    };
    pub use gridlock_room::{RoomConfig, RoomPhase};
    pub use gridlock_transport::{Connection, Transport, WsClientConnection};
}
