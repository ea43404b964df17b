//! Wire protocol for Gridlock.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerFrame`], the envelope and body
//!   structs): the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`BinaryCodec`]): how those messages are
//!   converted to/from bytes, plus the boundary functions
//!   ([`encode_client`], [`decode_client`], [`encode_server`],
//!   [`decode_server`]) that assemble and open envelopes.
//! - **Errors** ([`ProtocolError`]), with the fatal/soft split the
//!   receiver loops rely on.
//!
//! The protocol layer sits between transport (raw bytes) and the state
//! machines (typed commands). It knows nothing about connections, rooms,
//! or ticks.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage / ServerFrame) → state machines
//! ```

mod codec;
mod error;
mod types;

#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use codec::{BinaryCodec, Codec, decode_client, decode_server, encode_client, encode_server};
pub use error::{CodecError, ProtocolError};
pub use types::{
    ClientCommand, ClientEnvelope, ClientMessage, CommandKind, EnterRoomBody, GridPos,
    InputCommand, PlayerId, PlayerInputBody, PlayerSpawn, ResponseTimeBody, ServerCommand,
    ServerEnvelope, ServerFrame, ServerMessage, StartEnterGameBody, StartGameBody, Status,
    WorldSyncBody,
};
