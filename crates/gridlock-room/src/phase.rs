//! The room lifecycle phase machine.

use serde::{Deserialize, Serialize};

/// The lifecycle phase of the room.
///
/// Transitions are strictly ordered: monotone forward, no skipping:
///
/// ```text
/// Room → WaitPlayersReady → GameCountDown → Game → GameOver
/// ```
///
/// - **Room**: accepting connections; players run time-sync rounds.
/// - **WaitPlayersReady**: roster is full and synced; everyone is loading.
/// - **GameCountDown**: start instant chosen and broadcast; waiting for it.
/// - **Game**: lockstep relay running, logic frames advancing.
/// - **GameOver**: terminal. No transition drives it today; the phase
///   exists so the machine is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Room,
    WaitPlayersReady,
    GameCountDown,
    Game,
    GameOver,
}

impl RoomPhase {
    /// Returns `true` if the room is still admitting connections.
    pub fn is_accepting_players(&self) -> bool {
        matches!(self, Self::Room)
    }

    /// Returns `true` if logic frames advance in this phase.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Game)
    }

    /// The next phase in the strict ordering, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Room => Some(Self::WaitPlayersReady),
            Self::WaitPlayersReady => Some(Self::GameCountDown),
            Self::GameCountDown => Some(Self::Game),
            Self::Game => Some(Self::GameOver),
            Self::GameOver => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Room => write!(f, "Room"),
            Self::WaitPlayersReady => write!(f, "WaitPlayersReady"),
            Self::GameCountDown => write!(f, "GameCountDown"),
            Self::Game => write!(f, "Game"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}
