//! Core protocol types for Gridlock's wire format.
//!
//! This module defines every type that travels "on the wire": the structures
//! that get serialized to bytes, sent over the network, and deserialized on
//! the other side.
//!
//! The wire format is two-level: an outer *envelope* carries a raw command
//! tag plus an opaque body blob, and each body is itself a codec-encoded
//! struct whose shape is determined by the tag. Decoding happens once, at the
//! receive boundary, and produces the closed sum types [`ClientMessage`] and
//! [`ServerMessage`]. Use sites never see raw bytes.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity and geometry
// ---------------------------------------------------------------------------

/// A unique identifier for a player, assigned by the server.
///
/// Newtype over `i32` (the wire representation). Ids are allocated
/// monotonically starting from 1 and are never reassigned while the
/// server lives.
///
/// `#[serde(transparent)]` makes a `PlayerId(7)` serialize as just `7`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub i32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A cell on the game grid.
///
/// Coordinates are corner-origin and non-negative everywhere: `(0, 0)` is
/// the top-left cell and valid positions satisfy
/// `0 ≤ x < width ∧ 0 ≤ y < height`. Both endpoints use this convention,
/// so positions travel on the wire unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    /// The top-left cell.
    pub const ORIGIN: GridPos = GridPos { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this position shifted by `(dx, dy)`. No bounds check;
    /// callers clamp against their own map.
    pub fn offset(self, dx: i32, dy: i32) -> GridPos {
        GridPos {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Command tags
// ---------------------------------------------------------------------------

/// Client → server command tags.
///
/// On the wire the tag is a raw `u8` (see [`ClientEnvelope`]) so that an
/// unknown tag is representable after decoding: the receiver logs and
/// ignores it instead of treating the whole envelope as garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientCommand {
    Ping = 0,
    RequestTime = 1,
    PlayerInfo = 2,
    GameLoaded = 3,
    PlayerInput = 4,
}

impl ClientCommand {
    /// Maps a raw wire tag back to a command. `None` for unknown tags.
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Ping),
            1 => Some(Self::RequestTime),
            2 => Some(Self::PlayerInfo),
            3 => Some(Self::GameLoaded),
            4 => Some(Self::PlayerInput),
            _ => None,
        }
    }

    pub fn as_wire(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ping => "Ping",
            Self::RequestTime => "RequestTime",
            Self::PlayerInfo => "PlayerInfo",
            Self::GameLoaded => "GameLoaded",
            Self::PlayerInput => "PlayerInput",
        }
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server → client command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerCommand {
    Pong = 0,
    EnterRoom = 1,
    StartEnterGame = 2,
    StartGame = 3,
    WorldSync = 4,
    ResponseTime = 5,
    PlayerInputSync = 6,
}

impl ServerCommand {
    /// Maps a raw wire tag back to a command. `None` for unknown tags.
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Pong),
            1 => Some(Self::EnterRoom),
            2 => Some(Self::StartEnterGame),
            3 => Some(Self::StartGame),
            4 => Some(Self::WorldSync),
            5 => Some(Self::ResponseTime),
            6 => Some(Self::PlayerInputSync),
            _ => None,
        }
    }

    pub fn as_wire(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pong => "Pong",
            Self::EnterRoom => "EnterRoom",
            Self::StartEnterGame => "StartEnterGame",
            Self::StartGame => "StartGame",
            Self::WorldSync => "WorldSync",
            Self::ResponseTime => "ResponseTime",
            Self::PlayerInputSync => "PlayerInputSync",
        }
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome flag carried on every server envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Success,
    Failure,
}

// ---------------------------------------------------------------------------
// Envelopes (the literal wire structs)
// ---------------------------------------------------------------------------

/// Outer envelope for every client → server message.
///
/// `command` is the raw tag byte; `body` is the codec-encoded body struct
/// for commands that carry one (only `PlayerInput` today).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub command: u8,
    pub body: Option<Vec<u8>>,
}

/// Outer envelope for every server → client message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    pub command: u8,
    pub status: Status,
    pub code: i64,
    pub message: Option<String>,
    pub body: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Body sub-schemas
// ---------------------------------------------------------------------------

/// Body of `EnterRoom`: the server's admission reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterRoomBody {
    /// The id assigned to the newly admitted player.
    pub player_id: PlayerId,
    /// How many REQUEST_TIME/RESPONSE_TIME rounds the client must complete.
    pub time_sync_times: i32,
    /// Server heartbeat interval in whole seconds. Clients ping at half this.
    pub heartbeat_interval: i32,
}

/// Body of `ResponseTime`: one clock sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTimeBody {
    /// Server monotonic clock at send time, in milliseconds.
    pub server_time: i64,
}

/// One roster entry in `StartEnterGame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSpawn {
    pub player_id: PlayerId,
    pub position: GridPos,
}

/// Body of `StartEnterGame`: the full roster with starting positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEnterGameBody {
    pub players: Vec<PlayerSpawn>,
}

/// Body of `StartGame`: the globally agreed start instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameBody {
    /// Absolute start instant in *server* milliseconds. Clients translate
    /// into their own clock by adding their estimated offset.
    pub appointed_server_time: i64,
}

/// Body of `WorldSync`: the authoritative frame marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSyncBody {
    pub logic_frame: i32,
    pub server_time: i64,
}

/// The kind of a single input command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
}

impl CommandKind {
    /// The grid delta for a movement command.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::MoveLeft => (-1, 0),
            Self::MoveRight => (1, 0),
            Self::MoveUp => (0, -1),
            Self::MoveDown => (0, 1),
        }
    }

    /// The movement command for a unit delta, if `(dx, dy)` is one.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (-1, 0) => Some(Self::MoveLeft),
            (1, 0) => Some(Self::MoveRight),
            (0, -1) => Some(Self::MoveUp),
            (0, 1) => Some(Self::MoveDown),
            _ => None,
        }
    }
}

/// One command inside a `PlayerInput` body.
///
/// `ability_id`, `position`, and `custom` are carried for forward
/// compatibility; the directional movement variant leaves them zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCommand {
    pub kind: CommandKind,
    pub ability_id: i32,
    pub position: GridPos,
    pub custom: String,
}

/// Body of `PlayerInput` and `PlayerInputSync`. The relay forwards this
/// unchanged, so both directions share the one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInputBody {
    pub player_id: PlayerId,
    /// The logic frame the sender stamped this input with.
    pub frame: i32,
    pub commands: Vec<InputCommand>,
}

impl PlayerInputBody {
    /// Builds the directional variant: a single movement command.
    pub fn movement(player_id: PlayerId, frame: i32, kind: CommandKind) -> Self {
        Self {
            player_id,
            frame,
            commands: vec![InputCommand {
                kind,
                ability_id: 0,
                position: GridPos::ORIGIN,
                custom: String::new(),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded boundary types
// ---------------------------------------------------------------------------

/// A fully decoded client → server message. One variant per command tag,
/// with the typed body inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Ping,
    RequestTime,
    /// Accepted and ignored in this protocol revision.
    PlayerInfo,
    GameLoaded,
    PlayerInput(PlayerInputBody),
}

impl ClientMessage {
    pub fn command(&self) -> ClientCommand {
        match self {
            Self::Ping => ClientCommand::Ping,
            Self::RequestTime => ClientCommand::RequestTime,
            Self::PlayerInfo => ClientCommand::PlayerInfo,
            Self::GameLoaded => ClientCommand::GameLoaded,
            Self::PlayerInput(_) => ClientCommand::PlayerInput,
        }
    }
}

/// A fully decoded server → client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Pong,
    EnterRoom(EnterRoomBody),
    StartEnterGame(StartEnterGameBody),
    StartGame(StartGameBody),
    WorldSync(WorldSyncBody),
    ResponseTime(ResponseTimeBody),
    PlayerInputSync(PlayerInputBody),
}

impl ServerMessage {
    pub fn command(&self) -> ServerCommand {
        match self {
            Self::Pong => ServerCommand::Pong,
            Self::EnterRoom(_) => ServerCommand::EnterRoom,
            Self::StartEnterGame(_) => ServerCommand::StartEnterGame,
            Self::StartGame(_) => ServerCommand::StartGame,
            Self::WorldSync(_) => ServerCommand::WorldSync,
            Self::ResponseTime(_) => ServerCommand::ResponseTime,
            Self::PlayerInputSync(_) => ServerCommand::PlayerInputSync,
        }
    }
}

/// A decoded server envelope: status metadata plus the typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFrame {
    pub status: Status,
    pub code: i64,
    pub message: Option<String>,
    pub msg: ServerMessage,
}

impl ServerFrame {
    /// The common case: a success frame with no code or text.
    pub fn ok(msg: ServerMessage) -> Self {
        Self {
            status: Status::Success,
            code: 0,
            message: None,
            msg,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
