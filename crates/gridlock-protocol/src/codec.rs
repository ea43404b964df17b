//! Codec trait, implementations, and the envelope encode/decode boundary.
//!
//! A "codec" converts between Rust types and raw bytes. The protocol layer
//! doesn't care HOW values are serialized; it just needs something that
//! implements the [`Codec`] trait. [`BinaryCodec`] (bincode) is the
//! production choice: compact, deterministic, and byte-identical on
//! re-encode. A JSON codec is available behind the `json` feature for
//! debugging sessions where you want to read frames off the wire.
//!
//! The free functions at the bottom ([`encode_client`], [`decode_client`],
//! [`encode_server`], [`decode_server`]) are the only places in the codebase
//! that touch raw envelope bytes. Everything above them speaks
//! [`ClientMessage`] / [`ServerFrame`].

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{CodecError, ProtocolError};
use crate::types::{
    ClientCommand, ClientEnvelope, ClientMessage, ServerCommand, ServerEnvelope, ServerFrame,
    ServerMessage,
};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is shared across the server's
/// receiver tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;
}

// ---------------------------------------------------------------------------
// BinaryCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `bincode`.
///
/// Bincode is deterministic: encoding a decoded value reproduces the input
/// bytes exactly, which the wire contract requires
/// (`encode(decode(bytes)) == bytes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::new(*e))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(data).map_err(|e| CodecError::new(*e))
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`. Human-readable, larger frames.
/// Behind the `json` feature flag; both peers must agree on the codec.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::new)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::new)
    }
}

// ---------------------------------------------------------------------------
// Envelope boundary
// ---------------------------------------------------------------------------

fn body_err(command: &'static str) -> impl FnOnce(CodecError) -> ProtocolError {
    move |source| ProtocolError::Body { command, source }
}

/// Encodes a client message into envelope bytes.
pub fn encode_client<C: Codec>(
    codec: &C,
    msg: &ClientMessage,
) -> Result<Vec<u8>, ProtocolError> {
    let body = match msg {
        ClientMessage::Ping
        | ClientMessage::RequestTime
        | ClientMessage::PlayerInfo
        | ClientMessage::GameLoaded => None,
        ClientMessage::PlayerInput(input) => {
            Some(codec.encode(input).map_err(ProtocolError::Encode)?)
        }
    };
    let envelope = ClientEnvelope {
        command: msg.command().as_wire(),
        body,
    };
    codec.encode(&envelope).map_err(ProtocolError::Encode)
}

/// Decodes envelope bytes into a client message.
///
/// Envelope failures are fatal; unknown tags and bad bodies are soft
/// (see [`ProtocolError::is_fatal`]).
pub fn decode_client<C: Codec>(codec: &C, data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let envelope: ClientEnvelope = codec.decode(data).map_err(ProtocolError::Envelope)?;
    let command = ClientCommand::from_wire(envelope.command)
        .ok_or(ProtocolError::UnknownCommand(envelope.command))?;

    let msg = match command {
        ClientCommand::Ping => ClientMessage::Ping,
        ClientCommand::RequestTime => ClientMessage::RequestTime,
        ClientCommand::PlayerInfo => ClientMessage::PlayerInfo,
        ClientCommand::GameLoaded => ClientMessage::GameLoaded,
        ClientCommand::PlayerInput => {
            let body = envelope
                .body
                .as_deref()
                .ok_or(ProtocolError::MissingBody(command.name()))?;
            ClientMessage::PlayerInput(codec.decode(body).map_err(body_err(command.name()))?)
        }
    };
    Ok(msg)
}

/// Encodes a server frame into envelope bytes.
pub fn encode_server<C: Codec>(codec: &C, frame: &ServerFrame) -> Result<Vec<u8>, ProtocolError> {
    let body = match &frame.msg {
        ServerMessage::Pong => None,
        ServerMessage::EnterRoom(b) => Some(codec.encode(b).map_err(ProtocolError::Encode)?),
        ServerMessage::StartEnterGame(b) => Some(codec.encode(b).map_err(ProtocolError::Encode)?),
        ServerMessage::StartGame(b) => Some(codec.encode(b).map_err(ProtocolError::Encode)?),
        ServerMessage::WorldSync(b) => Some(codec.encode(b).map_err(ProtocolError::Encode)?),
        ServerMessage::ResponseTime(b) => Some(codec.encode(b).map_err(ProtocolError::Encode)?),
        ServerMessage::PlayerInputSync(b) => Some(codec.encode(b).map_err(ProtocolError::Encode)?),
    };
    let envelope = ServerEnvelope {
        command: frame.msg.command().as_wire(),
        status: frame.status,
        code: frame.code,
        message: frame.message.clone(),
        body,
    };
    codec.encode(&envelope).map_err(ProtocolError::Encode)
}

/// Decodes envelope bytes into a server frame.
pub fn decode_server<C: Codec>(codec: &C, data: &[u8]) -> Result<ServerFrame, ProtocolError> {
    let envelope: ServerEnvelope = codec.decode(data).map_err(ProtocolError::Envelope)?;
    let command = ServerCommand::from_wire(envelope.command)
        .ok_or(ProtocolError::UnknownCommand(envelope.command))?;

    let body = envelope.body.as_deref();
    let require_body = || body.ok_or(ProtocolError::MissingBody(command.name()));

    let msg = match command {
        ServerCommand::Pong => ServerMessage::Pong,
        ServerCommand::EnterRoom => ServerMessage::EnterRoom(
            codec
                .decode(require_body()?)
                .map_err(body_err(command.name()))?,
        ),
        ServerCommand::StartEnterGame => ServerMessage::StartEnterGame(
            codec
                .decode(require_body()?)
                .map_err(body_err(command.name()))?,
        ),
        ServerCommand::StartGame => ServerMessage::StartGame(
            codec
                .decode(require_body()?)
                .map_err(body_err(command.name()))?,
        ),
        ServerCommand::WorldSync => ServerMessage::WorldSync(
            codec
                .decode(require_body()?)
                .map_err(body_err(command.name()))?,
        ),
        ServerCommand::ResponseTime => ServerMessage::ResponseTime(
            codec
                .decode(require_body()?)
                .map_err(body_err(command.name()))?,
        ),
        ServerCommand::PlayerInputSync => ServerMessage::PlayerInputSync(
            codec
                .decode(require_body()?)
                .map_err(body_err(command.name()))?,
        ),
    };

    Ok(ServerFrame {
        status: envelope.status,
        code: envelope.code,
        message: envelope.message,
        msg,
    })
}

// =========================================================================
// Tests
// =========================================================================
