//! Player session management for Gridlock.
//!
//! This crate is the server's book of record for connected players:
//!
//! 1. **Admission**: capacity check, id allocation ([`PlayerRegistry::admit`])
//! 2. **Per-player state**: activity, time-sync progress, readiness,
//!    spawn position ([`PlayerRecord`])
//! 3. **Heartbeat bookkeeping**: which sessions have gone silent
//!    ([`PlayerRegistry::stale_ids`])
//! 4. **Fan-out**: delivering one encoded frame to every player
//!    ([`PlayerRegistry::broadcast`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← asks "everyone synced? everyone ready?" each tick
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Transport layer (below)  ← provides the Connection the registry sends on
//! ```

mod error;
mod player;
mod registry;

pub use error::SessionError;
pub use player::PlayerRecord;
pub use registry::PlayerRegistry;
