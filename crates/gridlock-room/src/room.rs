//! The room engine: lobby gating, countdown, and the lockstep frame loop.
//!
//! [`GameRoom`] is a pure state machine: the server's tick task feeds it a
//! clock reading and a roster snapshot, and it answers with directives:
//! what to broadcast, which inputs became due. It performs no I/O itself,
//! which keeps the whole lifecycle testable with fabricated clocks.

use std::collections::VecDeque;

use gridlock_protocol::{GridPos, PlayerId, PlayerInputBody, PlayerSpawn, WorldSyncBody};
use rand::seq::index;

use crate::{RoomConfig, RoomPhase};

/// What the room decided on one tick. The server executes these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomDirective {
    /// The lobby is complete and synced: broadcast START_ENTER_GAME with
    /// the assigned spawn positions.
    EnterLoadPhase { roster: Vec<PlayerSpawn> },

    /// Everyone loaded: broadcast START_GAME carrying the appointed
    /// start instant (server milliseconds).
    BeginCountdown { appointed_time: i64 },

    /// A WORLD_SYNC broadcast is due.
    WorldSync(WorldSyncBody),

    /// Inputs whose frame has been reached. The server relays inputs on
    /// receipt; this is the authoritative-execution hook, and no simulation
    /// is applied in this revision.
    InputsDue(Vec<PlayerInputBody>),
}

/// Roster facts the room needs each tick, snapshotted from the registry.
#[derive(Debug, Clone)]
pub struct RosterView {
    pub players: Vec<PlayerId>,
    pub all_time_synced: bool,
    pub all_ready: bool,
}

/// The authoritative room state machine.
pub struct GameRoom {
    config: RoomConfig,
    phase: RoomPhase,
    appointed_time_ms: i64,
    logic_frame: i32,
    tick_counter: u32,
    input_queue: VecDeque<PlayerInputBody>,
}

impl GameRoom {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: config.validated(),
            phase: RoomPhase::Room,
            appointed_time_ms: 0,
            logic_frame: 0,
            tick_counter: 0,
            input_queue: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn logic_frame(&self) -> i32 {
        self.logic_frame
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// The appointed start instant, meaningful from GameCountDown on.
    pub fn appointed_time_ms(&self) -> i64 {
        self.appointed_time_ms
    }

    /// Queued inputs not yet due (observable for diagnostics).
    pub fn pending_inputs(&self) -> usize {
        self.input_queue.len()
    }

    /// Enqueues a relayed input.
    ///
    /// Queue invariant: every queued entry has `frame ≥ logic_frame` as of
    /// enqueue time. An input stamped below the current frame (a laggard)
    /// is clamped up so it executes on the next drain.
    pub fn queue_input(&mut self, mut input: PlayerInputBody) {
        if input.frame < self.logic_frame {
            tracing::debug!(
                player_id = %input.player_id,
                frame = input.frame,
                logic_frame = self.logic_frame,
                "late input clamped to current frame"
            );
            input.frame = self.logic_frame;
        }
        self.input_queue.push_back(input);
    }

    /// Advances the state machine by one tick.
    ///
    /// `now_ms` is the tick's clock reading; `roster` is the registry
    /// snapshot taken for this tick.
    pub fn tick(&mut self, now_ms: i64, roster: &RosterView) -> Vec<RoomDirective> {
        let mut directives = Vec::new();

        match self.phase {
            RoomPhase::Room => {
                let full = roster.players.len() == self.config.max_players;
                if full && roster.all_time_synced {
                    let spawns = self.assign_spawns(&roster.players);
                    self.advance(RoomPhase::WaitPlayersReady);
                    directives.push(RoomDirective::EnterLoadPhase { roster: spawns });
                }
            }

            RoomPhase::WaitPlayersReady => {
                if roster.all_ready {
                    self.appointed_time_ms =
                        now_ms + self.config.appointed_delay.as_millis() as i64;
                    self.advance(RoomPhase::GameCountDown);
                    directives.push(RoomDirective::BeginCountdown {
                        appointed_time: self.appointed_time_ms,
                    });
                }
            }

            RoomPhase::GameCountDown => {
                if now_ms >= self.appointed_time_ms {
                    self.advance(RoomPhase::Game);
                    self.logic_frame = 0;
                    self.tick_counter = 0;
                    self.input_queue.clear();
                    tracing::info!(
                        now_ms,
                        appointed_ms = self.appointed_time_ms,
                        "game started"
                    );
                }
            }

            RoomPhase::Game => {
                self.tick_counter += 1;
                self.logic_frame += 1;

                let due = self.drain_due_inputs();
                if !due.is_empty() {
                    directives.push(RoomDirective::InputsDue(due));
                }
                if !self.input_queue.is_empty() {
                    // Clients stamp inputs at or below the frame they have
                    // reached, which never outruns the server.
                    tracing::warn!(
                        pending = self.input_queue.len(),
                        logic_frame = self.logic_frame,
                        "inputs stamped beyond the current frame remain queued"
                    );
                }

                if self.tick_counter == self.config.world_sync_period() {
                    self.tick_counter = 0;
                    directives.push(RoomDirective::WorldSync(WorldSyncBody {
                        logic_frame: self.logic_frame,
                        server_time: now_ms,
                    }));
                }
            }

            RoomPhase::GameOver => {}
        }

        directives
    }

    /// Splits the queue: entries with `frame ≤ logic_frame` are due and
    /// removed (relative order preserved), later entries stay queued.
    fn drain_due_inputs(&mut self) -> Vec<PlayerInputBody> {
        let mut due = Vec::new();
        let mut pending = VecDeque::new();
        while let Some(input) = self.input_queue.pop_front() {
            if input.frame <= self.logic_frame {
                due.push(input);
            } else {
                pending.push_back(input);
            }
        }
        self.input_queue = pending;
        due
    }

    /// Draws a unique interior cell per player, uniformly without
    /// replacement. Interior means the outermost ring is excluded. When
    /// there are fewer interior cells than players, the overflow players
    /// stay at the origin.
    fn assign_spawns(&self, players: &[PlayerId]) -> Vec<PlayerSpawn> {
        let inner_w = (self.config.map_width - 2).max(0);
        let inner_h = (self.config.map_height - 2).max(0);
        let cell_count = (inner_w * inner_h) as usize;

        if cell_count < players.len() {
            tracing::warn!(
                cells = cell_count,
                players = players.len(),
                "not enough interior cells, overflow players spawn at origin"
            );
        }

        let drawn = index::sample(
            &mut rand::rng(),
            cell_count,
            cell_count.min(players.len()),
        );

        players
            .iter()
            .enumerate()
            .map(|(i, &player_id)| {
                let position = match drawn.iter().nth(i) {
                    Some(cell) => GridPos::new(
                        1 + (cell as i32) % inner_w,
                        1 + (cell as i32) / inner_w,
                    ),
                    None => GridPos::ORIGIN,
                };
                PlayerSpawn {
                    player_id,
                    position,
                }
            })
            .collect()
    }

    /// Moves to the next phase. Transitions are monotone by construction;
    /// the guard documents the invariant.
    fn advance(&mut self, to: RoomPhase) {
        debug_assert!(self.phase.can_transition_to(to));
        tracing::info!(from = %self.phase, to = %to, "room phase transition");
        self.phase = to;
    }
}
