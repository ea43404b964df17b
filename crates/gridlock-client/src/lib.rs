//! Gridlock client: the symmetric half of the lockstep lifecycle.
//!
//! A [`GameClient`] dials a Gridlock server and mirrors its room machine
//! locally: `Invalid → Room → GameCountDown → Game → GameOver`. It runs
//! the time-sync rounds, arms the countdown from the appointed server
//! instant, paces local input sends, and executes relayed inputs against
//! a bounded-grid replica ([`GridWorld`]) once their frame comes due.
//!
//! The hosting UI talks to the client through a [`ClientHandle`]
//! (movement capture, state inspection) and a stream of [`UiEvent`]s.

mod client;
mod error;
mod simulation;
mod state;

pub use client::{ClientConfig, ClientHandle, GameClient};
pub use error::ClientError;
pub use simulation::GridWorld;
pub use state::{ClientPhase, UiEvent};
