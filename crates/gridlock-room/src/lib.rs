//! Room lifecycle for Gridlock.
//!
//! The authoritative state machine driving a session from lobby to
//! lockstep: admission gating, time-sync completion, the simultaneous-load
//! wait, the appointed-time countdown, and the frame loop with its input
//! queue and world-sync cadence.
//!
//! The room is deliberately I/O-free: it consumes clock readings and
//! roster snapshots and produces [`RoomDirective`]s for the server facade
//! to execute.

mod config;
mod phase;
mod room;

pub use config::RoomConfig;
pub use phase::RoomPhase;
pub use room::{GameRoom, RoomDirective, RosterView};
