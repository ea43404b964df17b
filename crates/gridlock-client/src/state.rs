//! The client lifecycle state machine.
//!
//! [`ClientState`] mirrors the server's room machine from the other side
//! of the wire: `Invalid → Room → GameCountDown → Game → GameOver`. It is
//! pure: the receiver task feeds it decoded frames, the tick task feeds
//! it clock readings, and it answers with actions to send and UI events
//! to surface. All I/O lives in [`crate::client`].

use std::collections::VecDeque;

use gridlock_protocol::{
    CommandKind, GridPos, PlayerId, PlayerInputBody, ServerFrame, ServerMessage, Status,
};

use crate::{ClientError, GridWorld};

/// The client's lifecycle phase. Transitions are monotone forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Connected, ENTER_ROOM not seen yet.
    Invalid,
    /// Admitted; running time-sync rounds.
    Room,
    /// Start instant known; waiting for it locally.
    GameCountDown,
    /// Lockstep running.
    Game,
    /// Terminal. Nothing drives this transition today.
    GameOver,
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid => write!(f, "Invalid"),
            Self::Room => write!(f, "Room"),
            Self::GameCountDown => write!(f, "GameCountDown"),
            Self::Game => write!(f, "Game"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

/// Events surfaced to whatever UI shell hosts the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// ENTER_ROOM bound this client to a player id.
    LocalPlayerBound(PlayerId),
    /// The lifecycle advanced.
    PhaseChanged(ClientPhase),
    /// A replica was created from the roster broadcast.
    ReplicaSpawned { id: PlayerId, position: GridPos },
    /// A replica moved by executing a relayed input.
    ReplicaMoved { id: PlayerId, position: GridPos },
}

/// What the tick decided to send this iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TickAction {
    SendRequestTime,
    SendPlayerInput(PlayerInputBody),
}

/// Follow-up work a received frame requires of the receiver task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameAction {
    None,
    /// START_ENTER_GAME processed: simulate loading, then send GAME_LOADED.
    BeginLoading,
}

pub(crate) struct ClientState {
    pub(crate) phase: ClientPhase,
    pub(crate) player_id: Option<PlayerId>,
    pub(crate) world: GridWorld,

    // Time sync.
    time_sync_target: i32,
    time_sync_count: i32,
    last_sync_send_ms: i64,
    rtt_ms: i64,
    clock_offset_ms: i64,
    pub(crate) heartbeat_interval_secs: Option<f64>,

    // Countdown.
    desired_start_ms: i64,
    game_start_ms: i64,

    // Lockstep.
    logic_frame: i32,
    desired_logic_frame: i32,
    world_sync_pending: bool,
    pending_input: Option<CommandKind>,
    last_input_send_ms: i64,
    send_input_interval_ms: i64,
    sync_input_queue: VecDeque<PlayerInputBody>,
}

impl ClientState {
    pub(crate) fn new(map_width: i32, map_height: i32, send_input_interval_ms: i64) -> Self {
        Self {
            phase: ClientPhase::Invalid,
            player_id: None,
            world: GridWorld::new(map_width, map_height),
            time_sync_target: 0,
            time_sync_count: 0,
            last_sync_send_ms: 0,
            rtt_ms: 0,
            clock_offset_ms: 0,
            heartbeat_interval_secs: None,
            desired_start_ms: 0,
            game_start_ms: 0,
            logic_frame: 0,
            desired_logic_frame: 0,
            world_sync_pending: false,
            pending_input: None,
            // Lets the first input go out immediately.
            last_input_send_ms: -send_input_interval_ms,
            send_input_interval_ms,
            sync_input_queue: VecDeque::new(),
        }
    }

    pub(crate) fn logic_frame(&self) -> i32 {
        self.logic_frame
    }

    pub(crate) fn rtt_ms(&self) -> i64 {
        self.rtt_ms
    }

    pub(crate) fn clock_offset_ms(&self) -> i64 {
        self.clock_offset_ms
    }

    /// Captures a local movement intent: exactly one axis, one step.
    /// The input is stamped with the logic frame current at send time.
    pub(crate) fn set_movement(&mut self, dx: i32, dy: i32) -> Result<(), ClientError> {
        let kind = CommandKind::from_delta(dx, dy)
            .ok_or(ClientError::InvalidMovement { dx, dy })?;
        self.pending_input = Some(kind);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Receiver side
    // -----------------------------------------------------------------

    /// Applies one decoded server frame.
    pub(crate) fn handle_frame(
        &mut self,
        frame: ServerFrame,
        now_ms: i64,
        ui: &mut Vec<UiEvent>,
    ) -> Result<FrameAction, ClientError> {
        if frame.status == Status::Failure {
            tracing::warn!(
                code = frame.code,
                message = frame.message.as_deref().unwrap_or(""),
                command = %frame.msg.command(),
                "server reported failure"
            );
        }

        match frame.msg {
            ServerMessage::Pong => {}

            ServerMessage::EnterRoom(body) => {
                if self.player_id.is_some() {
                    return Err(ClientError::Violation(
                        "second ENTER_ROOM for an already bound client".into(),
                    ));
                }
                self.player_id = Some(body.player_id);
                self.time_sync_target = body.time_sync_times;
                // Ping at half the server's interval.
                self.heartbeat_interval_secs = Some(body.heartbeat_interval as f64 / 2.0);
                self.advance(ClientPhase::Room, ui);
                ui.push(UiEvent::LocalPlayerBound(body.player_id));
                tracing::info!(
                    player_id = %body.player_id,
                    time_sync_times = body.time_sync_times,
                    heartbeat_secs = body.heartbeat_interval,
                    "entered room"
                );
            }

            ServerMessage::ResponseTime(body) => {
                self.time_sync_count += 1;
                let rtt_sample = now_ms - self.last_sync_send_ms;
                let offset_sample = now_ms - body.server_time;
                tracing::debug!(
                    round = self.time_sync_count,
                    rtt_ms = rtt_sample,
                    offset_ms = offset_sample,
                    "time sync sample"
                );
                // The first round carries cold-start latency; it is
                // discarded and the remaining rounds feed running means.
                let n = self.time_sync_count as i64;
                if n > 1 {
                    self.rtt_ms = (self.rtt_ms * (n - 2) + rtt_sample) / (n - 1);
                    self.clock_offset_ms =
                        (self.clock_offset_ms * (n - 2) + offset_sample) / (n - 1);
                    tracing::debug!(
                        avg_rtt_ms = self.rtt_ms,
                        avg_offset_ms = self.clock_offset_ms,
                        "time sync averages"
                    );
                }
            }

            ServerMessage::StartEnterGame(body) => {
                for spawn in &body.players {
                    self.world.spawn(spawn.player_id, spawn.position)?;
                    ui.push(UiEvent::ReplicaSpawned {
                        id: spawn.player_id,
                        position: spawn.position,
                    });
                }
                tracing::info!(players = body.players.len(), "roster received, loading");
                return Ok(FrameAction::BeginLoading);
            }

            ServerMessage::StartGame(body) => {
                // Translate the server instant into this clock.
                self.desired_start_ms = body.appointed_server_time + self.clock_offset_ms;
                self.advance(ClientPhase::GameCountDown, ui);
                tracing::info!(
                    appointed_server_ms = body.appointed_server_time,
                    local_start_ms = self.desired_start_ms,
                    "countdown armed"
                );
            }

            ServerMessage::WorldSync(body) => {
                if body.logic_frame < self.desired_logic_frame {
                    tracing::debug!(
                        frame = body.logic_frame,
                        desired = self.desired_logic_frame,
                        "regressive world sync dropped"
                    );
                } else {
                    self.desired_logic_frame = body.logic_frame;
                    self.world_sync_pending = true;
                }
            }

            ServerMessage::PlayerInputSync(body) => {
                self.sync_input_queue.push_back(body);
            }
        }

        Ok(FrameAction::None)
    }

    // -----------------------------------------------------------------
    // Tick side
    // -----------------------------------------------------------------

    /// Advances the state machine by one local tick.
    pub(crate) fn tick(&mut self, now_ms: i64, ui: &mut Vec<UiEvent>) -> Vec<TickAction> {
        let mut actions = Vec::new();

        match self.phase {
            ClientPhase::Invalid | ClientPhase::GameOver => {}

            ClientPhase::Room => {
                if self.time_sync_count < self.time_sync_target {
                    self.last_sync_send_ms = now_ms;
                    actions.push(TickAction::SendRequestTime);
                }
            }

            ClientPhase::GameCountDown => {
                if now_ms >= self.desired_start_ms {
                    self.game_start_ms = now_ms;
                    self.advance(ClientPhase::Game, ui);
                    tracing::info!(start_ms = now_ms, "game started locally");
                }
            }

            ClientPhase::Game => {
                // 1. Paced local input send, stamped with the current frame.
                if let Some(kind) = self.pending_input {
                    if now_ms - self.last_input_send_ms >= self.send_input_interval_ms {
                        let player_id = self.player_id.unwrap_or(PlayerId(0));
                        self.pending_input = None;
                        self.last_input_send_ms = now_ms;
                        actions.push(TickAction::SendPlayerInput(PlayerInputBody::movement(
                            player_id,
                            self.logic_frame,
                            kind,
                        )));
                    }
                }

                // 2. Adopt the authoritative frame.
                if self.world_sync_pending {
                    self.world_sync_pending = false;
                    self.logic_frame = self.desired_logic_frame;
                }

                // 3. Execute every relayed input that has become due.
                self.drain_due_inputs(ui);

                tracing::trace!(
                    elapsed_ms = now_ms - self.game_start_ms,
                    frame = self.logic_frame,
                    "game tick"
                );
            }
        }

        actions
    }

    fn drain_due_inputs(&mut self, ui: &mut Vec<UiEvent>) {
        let mut pending = VecDeque::new();
        while let Some(input) = self.sync_input_queue.pop_front() {
            if input.frame <= self.logic_frame {
                if let Some(position) = self.world.apply(&input) {
                    ui.push(UiEvent::ReplicaMoved {
                        id: input.player_id,
                        position,
                    });
                }
            } else {
                pending.push_back(input);
            }
        }
        self.sync_input_queue = pending;
    }

    fn advance(&mut self, to: ClientPhase, ui: &mut Vec<UiEvent>) {
        tracing::info!(from = %self.phase, to = %to, "client phase transition");
        self.phase = to;
        ui.push(UiEvent::PhaseChanged(to));
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gridlock_protocol::{
        EnterRoomBody, PlayerSpawn, ResponseTimeBody, StartEnterGameBody, StartGameBody,
        WorldSyncBody,
    };

    fn frame(msg: ServerMessage) -> ServerFrame {
        ServerFrame::ok(msg)
    }

    fn state() -> ClientState {
        ClientState::new(10, 10, 2_000)
    }

    /// ENTER_ROOM with target 3, heartbeat 2s.
    fn entered() -> ClientState {
        let mut st = state();
        let mut ui = Vec::new();
        st.handle_frame(
            frame(ServerMessage::EnterRoom(EnterRoomBody {
                player_id: PlayerId(1),
                time_sync_times: 3,
                heartbeat_interval: 2,
            })),
            0,
            &mut ui,
        )
        .unwrap();
        st
    }

    /// Runs one time-sync round: tick stamps the send, then the response
    /// arrives `rtt` ms later from a server whose clock reads `server_time`.
    fn sync_round(st: &mut ClientState, send_at: i64, rtt: i64, server_time: i64) {
        let mut ui = Vec::new();
        let actions = st.tick(send_at, &mut ui);
        assert!(actions.contains(&TickAction::SendRequestTime));
        st.handle_frame(
            frame(ServerMessage::ResponseTime(ResponseTimeBody { server_time })),
            send_at + rtt,
            &mut ui,
        )
        .unwrap();
    }

    // =====================================================================
    // Admission
    // =====================================================================

    #[test]
    fn test_enter_room_binds_player_and_enters_room_phase() {
        let mut st = state();
        let mut ui = Vec::new();
        st.handle_frame(
            frame(ServerMessage::EnterRoom(EnterRoomBody {
                player_id: PlayerId(7),
                time_sync_times: 3,
                heartbeat_interval: 5,
            })),
            0,
            &mut ui,
        )
        .unwrap();

        assert_eq!(st.phase, ClientPhase::Room);
        assert_eq!(st.player_id, Some(PlayerId(7)));
        assert_eq!(st.heartbeat_interval_secs, Some(2.5));
        assert!(ui.contains(&UiEvent::LocalPlayerBound(PlayerId(7))));
        assert!(ui.contains(&UiEvent::PhaseChanged(ClientPhase::Room)));
    }

    #[test]
    fn test_second_enter_room_is_a_violation() {
        let mut st = entered();
        let mut ui = Vec::new();
        let err = st
            .handle_frame(
                frame(ServerMessage::EnterRoom(EnterRoomBody {
                    player_id: PlayerId(2),
                    time_sync_times: 3,
                    heartbeat_interval: 2,
                })),
                0,
                &mut ui,
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::Violation(_)));
    }

    // =====================================================================
    // Time sync
    // =====================================================================

    #[test]
    fn test_room_ticks_request_time_until_target() {
        let mut st = entered();
        let mut ui = Vec::new();

        for round in 0..3 {
            let actions = st.tick(round * 100, &mut ui);
            assert_eq!(actions, vec![TickAction::SendRequestTime]);
            st.handle_frame(
                frame(ServerMessage::ResponseTime(ResponseTimeBody {
                    server_time: round * 100,
                })),
                round * 100 + 10,
                &mut ui,
            )
            .unwrap();
        }

        // Target reached: no more requests.
        let actions = st.tick(1_000, &mut ui);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_first_time_sync_sample_is_discarded() {
        let mut st = entered();

        // A wildly inflated cold-start round must leave no trace.
        sync_round(&mut st, 0, 500, -5_000);
        assert_eq!(st.rtt_ms(), 0);
        assert_eq!(st.clock_offset_ms(), 0);

        // The second round becomes the average as-is.
        // send at 1000, rtt 40 → response at 1040, server clock 840 → offset 200.
        sync_round(&mut st, 1_000, 40, 840);
        assert_eq!(st.rtt_ms(), 40);
        assert_eq!(st.clock_offset_ms(), 200);
    }

    #[test]
    fn test_time_sync_running_mean_over_later_samples() {
        let mut st = entered();
        sync_round(&mut st, 0, 500, 0); // discarded
        sync_round(&mut st, 1_000, 40, 840); // rtt 40, offset 200
        sync_round(&mut st, 2_000, 20, 1_720); // rtt 20, offset 300

        assert_eq!(st.rtt_ms(), 30, "mean of 40 and 20");
        assert_eq!(st.clock_offset_ms(), 250, "mean of 200 and 300");
    }

    // =====================================================================
    // Roster and countdown
    // =====================================================================

    #[test]
    fn test_roster_spawns_replicas_and_begins_loading() {
        let mut st = entered();
        let mut ui = Vec::new();
        let action = st
            .handle_frame(
                frame(ServerMessage::StartEnterGame(StartEnterGameBody {
                    players: vec![
                        PlayerSpawn {
                            player_id: PlayerId(1),
                            position: GridPos::new(2, 3),
                        },
                        PlayerSpawn {
                            player_id: PlayerId(2),
                            position: GridPos::new(7, 6),
                        },
                    ],
                })),
                0,
                &mut ui,
            )
            .unwrap();

        assert_eq!(action, FrameAction::BeginLoading);
        assert_eq!(st.world.position(PlayerId(1)), Some(GridPos::new(2, 3)));
        assert_eq!(st.world.position(PlayerId(2)), Some(GridPos::new(7, 6)));
        assert!(ui.contains(&UiEvent::ReplicaSpawned {
            id: PlayerId(1),
            position: GridPos::new(2, 3),
        }));
    }

    #[test]
    fn test_duplicate_roster_entry_is_a_violation() {
        let mut st = entered();
        let mut ui = Vec::new();
        let spawn = PlayerSpawn {
            player_id: PlayerId(1),
            position: GridPos::new(2, 3),
        };
        let err = st
            .handle_frame(
                frame(ServerMessage::StartEnterGame(StartEnterGameBody {
                    players: vec![spawn, spawn],
                })),
                0,
                &mut ui,
            )
            .unwrap_err();
        assert!(matches!(err, ClientError::Violation(_)));
    }

    #[test]
    fn test_countdown_holds_until_translated_instant() {
        let mut st = entered();
        sync_round(&mut st, 0, 500, 0);
        sync_round(&mut st, 1_000, 40, 840); // offset = +200

        let mut ui = Vec::new();
        st.handle_frame(
            frame(ServerMessage::StartGame(StartGameBody {
                appointed_server_time: 5_000,
            })),
            1_100,
            &mut ui,
        )
        .unwrap();
        assert_eq!(st.phase, ClientPhase::GameCountDown);

        // Appointed 5000 server ms + offset 200 → local 5200.
        st.tick(5_199, &mut ui);
        assert_eq!(st.phase, ClientPhase::GameCountDown);

        st.tick(5_200, &mut ui);
        assert_eq!(st.phase, ClientPhase::Game);
        assert!(ui.contains(&UiEvent::PhaseChanged(ClientPhase::Game)));
    }

    // =====================================================================
    // Lockstep
    // =====================================================================

    /// A state already in Game with two replicas.
    fn in_game() -> ClientState {
        let mut st = entered();
        let mut ui = Vec::new();
        st.handle_frame(
            frame(ServerMessage::StartEnterGame(StartEnterGameBody {
                players: vec![
                    PlayerSpawn {
                        player_id: PlayerId(1),
                        position: GridPos::new(2, 3),
                    },
                    PlayerSpawn {
                        player_id: PlayerId(2),
                        position: GridPos::new(7, 6),
                    },
                ],
            })),
            0,
            &mut ui,
        )
        .unwrap();
        st.handle_frame(
            frame(ServerMessage::StartGame(StartGameBody {
                appointed_server_time: 100,
            })),
            0,
            &mut ui,
        )
        .unwrap();
        st.tick(100, &mut ui);
        assert_eq!(st.phase, ClientPhase::Game);
        st
    }

    #[test]
    fn test_world_sync_adopts_frame_on_next_tick() {
        let mut st = in_game();
        let mut ui = Vec::new();

        st.handle_frame(
            frame(ServerMessage::WorldSync(WorldSyncBody {
                logic_frame: 25,
                server_time: 600,
            })),
            600,
            &mut ui,
        )
        .unwrap();
        assert_eq!(st.logic_frame(), 0, "adoption happens on the tick");

        st.tick(610, &mut ui);
        assert_eq!(st.logic_frame(), 25);
    }

    #[test]
    fn test_regressive_world_sync_is_dropped() {
        let mut st = in_game();
        let mut ui = Vec::new();

        for (frame_no, at) in [(25, 600), (10, 700)] {
            st.handle_frame(
                frame(ServerMessage::WorldSync(WorldSyncBody {
                    logic_frame: frame_no,
                    server_time: at,
                })),
                at,
                &mut ui,
            )
            .unwrap();
        }
        st.tick(710, &mut ui);
        assert_eq!(st.logic_frame(), 25, "regression must not rewind the frame");
    }

    #[test]
    fn test_relayed_inputs_execute_once_due() {
        let mut st = in_game();
        let mut ui = Vec::new();

        // Relayed input for frame 5; client is still at frame 0.
        st.handle_frame(
            frame(ServerMessage::PlayerInputSync(PlayerInputBody::movement(
                PlayerId(2),
                5,
                CommandKind::MoveLeft,
            ))),
            200,
            &mut ui,
        )
        .unwrap();

        st.tick(210, &mut ui);
        assert_eq!(
            st.world.position(PlayerId(2)),
            Some(GridPos::new(7, 6)),
            "not due yet"
        );

        // World sync catches the client up past frame 5.
        st.handle_frame(
            frame(ServerMessage::WorldSync(WorldSyncBody {
                logic_frame: 25,
                server_time: 600,
            })),
            600,
            &mut ui,
        )
        .unwrap();
        st.tick(610, &mut ui);

        assert_eq!(st.world.position(PlayerId(2)), Some(GridPos::new(6, 6)));
        assert!(ui.contains(&UiEvent::ReplicaMoved {
            id: PlayerId(2),
            position: GridPos::new(6, 6),
        }));
    }

    #[test]
    fn test_local_input_is_paced_and_frame_stamped() {
        let mut st = in_game();
        let mut ui = Vec::new();

        // Catch up to frame 25 first.
        st.handle_frame(
            frame(ServerMessage::WorldSync(WorldSyncBody {
                logic_frame: 25,
                server_time: 600,
            })),
            600,
            &mut ui,
        )
        .unwrap();
        st.tick(610, &mut ui);

        st.set_movement(1, 0).unwrap();
        let actions = st.tick(620, &mut ui);
        assert_eq!(
            actions,
            vec![TickAction::SendPlayerInput(PlayerInputBody::movement(
                PlayerId(1),
                25,
                CommandKind::MoveRight,
            ))],
            "stamped with the current logic frame"
        );

        // A fresh intent inside the pacing window stays pending.
        st.set_movement(0, 1).unwrap();
        assert!(st.tick(700, &mut ui).is_empty());

        // And goes out once the interval has elapsed.
        let actions = st.tick(620 + 2_000, &mut ui);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_set_movement_rejects_non_unit_steps() {
        let mut st = in_game();
        assert!(matches!(
            st.set_movement(0, 0),
            Err(ClientError::InvalidMovement { .. })
        ));
        assert!(matches!(
            st.set_movement(1, 1),
            Err(ClientError::InvalidMovement { .. })
        ));
        assert!(matches!(
            st.set_movement(-2, 0),
            Err(ClientError::InvalidMovement { .. })
        ));
        assert!(st.set_movement(0, -1).is_ok());
    }
}
