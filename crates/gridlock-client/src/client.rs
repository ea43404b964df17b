//! The client driver: connection, receiver task, tick loop, heartbeat.
//!
//! [`GameClient`] owns the two long-lived tasks of the client side (a
//! receiver decoding server frames and a 60 Hz tick loop) plus a
//! heartbeat ticker and the short-lived load-simulation task. All of them
//! share the pure [`ClientState`] behind a mutex; none of them holds the
//! lock across a network operation.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gridlock_protocol::{
    BinaryCodec, ClientMessage, GridPos, PlayerId, decode_server, encode_client,
};
use gridlock_tick::{GameClock, TickConfig, TickScheduler};
use gridlock_transport::{Connection, WsClientConnection};
use rand::Rng;
use tokio::sync::mpsc;

use crate::state::{ClientState, FrameAction, TickAction};
use crate::{ClientError, ClientPhase, UiEvent};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to dial.
    pub server_addr: String,

    /// Local tick rate in Hz.
    pub tick_rate: u32,

    /// Minimum interval between PLAYER_INPUT sends.
    pub send_input_interval: Duration,

    /// Reserved tuning value, accepted but not interpreted.
    pub execution_duration: Duration,

    /// Replica grid dimensions; must match the server's map.
    pub map_width: i32,
    pub map_height: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:12345".to_string(),
            tick_rate: 60,
            send_input_interval: Duration::from_secs(2),
            execution_duration: Duration::from_millis(500),
            map_width: 10,
            map_height: 10,
        }
    }
}

/// Locks the shared state, recovering it if a task died mid-update.
fn lock(state: &Mutex<ClientState>) -> MutexGuard<'_, ClientState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A handle for the hosting UI: capture input, inspect replicated state.
/// Cheap to clone; usable from synchronous contexts.
#[derive(Clone)]
pub struct ClientHandle {
    state: Arc<Mutex<ClientState>>,
}

impl ClientHandle {
    /// Captures a movement intent with exactly one axis nonzero.
    /// `(0, 0)` and diagonals are rejected.
    pub fn send_movement(&self, dx: i32, dy: i32) -> Result<(), ClientError> {
        lock(&self.state).set_movement(dx, dy)
    }

    pub fn phase(&self) -> ClientPhase {
        lock(&self.state).phase
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        lock(&self.state).player_id
    }

    pub fn logic_frame(&self) -> i32 {
        lock(&self.state).logic_frame()
    }

    pub fn position_of(&self, id: PlayerId) -> Option<GridPos> {
        lock(&self.state).world.position(id)
    }

    pub fn rtt_ms(&self) -> i64 {
        lock(&self.state).rtt_ms()
    }

    pub fn clock_offset_ms(&self) -> i64 {
        lock(&self.state).clock_offset_ms()
    }
}

/// A connected Gridlock client.
pub struct GameClient {
    conn: Arc<WsClientConnection>,
    codec: BinaryCodec,
    clock: GameClock,
    state: Arc<Mutex<ClientState>>,
    config: ClientConfig,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
}

impl GameClient {
    /// Dials the server. Returns the client and the UI event stream.
    pub async fn connect(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UiEvent>), ClientError> {
        let conn = WsClientConnection::dial(&config.server_addr).await?;
        tracing::info!(addr = %config.server_addr, "connected to server");

        let state = Arc::new(Mutex::new(ClientState::new(
            config.map_width,
            config.map_height,
            config.send_input_interval.as_millis() as i64,
        )));
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                conn,
                codec: BinaryCodec,
                clock: GameClock::new(),
                state,
                config,
                ui_tx,
            },
            ui_rx,
        ))
    }

    /// A handle for driving and observing this client.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs until the session ends.
    ///
    /// Always returns an error: the protocol defines no clean client
    /// exit, so the session ends when the receiver fails (server gone,
    /// unreadable envelope, protocol violation) and the process is
    /// expected to log it and quit.
    pub async fn run(self) -> Result<(), ClientError> {
        let mut receiver = tokio::spawn(receiver_loop(
            Arc::clone(&self.conn),
            self.codec,
            self.clock,
            Arc::clone(&self.state),
            self.ui_tx.clone(),
        ));

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.conn),
            self.codec,
            Arc::clone(&self.state),
        ));

        let mut scheduler = TickScheduler::new(TickConfig::with_rate(self.config.tick_rate));

        let result = loop {
            tokio::select! {
                joined = &mut receiver => {
                    break match joined {
                        Ok(res) => res,
                        Err(e) => Err(ClientError::ReceiverFailed(e.to_string())),
                    };
                }
                _ = scheduler.wait_for_tick() => {
                    let now = self.clock.now_ms();
                    let (actions, events) = {
                        let mut state = lock(&self.state);
                        let mut ui = Vec::new();
                        let actions = state.tick(now, &mut ui);
                        (actions, ui)
                    };
                    for event in events {
                        self.ui_tx.send(event).ok();
                    }
                    if let Err(e) = self.send_actions(actions).await {
                        break Err(e);
                    }
                    scheduler.record_tick_end();
                }
            }
        };

        heartbeat.abort();
        receiver.abort();
        self.conn.close().await.ok();
        tracing::info!("client stopped");
        result
    }

    async fn send_actions(&self, actions: Vec<TickAction>) -> Result<(), ClientError> {
        for action in actions {
            let msg = match action {
                TickAction::SendRequestTime => ClientMessage::RequestTime,
                TickAction::SendPlayerInput(body) => ClientMessage::PlayerInput(body),
            };
            let bytes = encode_client(&self.codec, &msg)?;
            self.conn.send(&bytes).await?;
        }
        Ok(())
    }
}

/// Reads and dispatches server frames until the session dies.
async fn receiver_loop(
    conn: Arc<WsClientConnection>,
    codec: BinaryCodec,
    clock: GameClock,
    state: Arc<Mutex<ClientState>>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) -> Result<(), ClientError> {
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => return Err(ClientError::ConnectionClosed),
            Err(e) => return Err(e.into()),
        };

        let frame = match decode_server(&codec, &data) {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "frame dropped");
                continue;
            }
        };

        let now = clock.now_ms();
        let (action, events) = {
            let mut state = lock(&state);
            let mut ui = Vec::new();
            let action = state.handle_frame(frame, now, &mut ui);
            (action, ui)
        };
        for event in events {
            ui_tx.send(event).ok();
        }

        match action? {
            FrameAction::None => {}
            FrameAction::BeginLoading => {
                // Simulated load: a bounded random delay, then GAME_LOADED.
                let delay = Duration::from_millis(rand::rng().random_range(500..=2500));
                let conn = Arc::clone(&conn);
                tokio::spawn(async move {
                    tracing::info!(delay_ms = delay.as_millis() as u64, "loading");
                    tokio::time::sleep(delay).await;
                    match encode_client(&codec, &ClientMessage::GameLoaded) {
                        Ok(bytes) => {
                            if let Err(e) = conn.send(&bytes).await {
                                tracing::warn!(error = %e, "failed to report loaded");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "GAME_LOADED failed to encode"),
                    }
                });
            }
        }
    }
}

/// Sends PING at the advertised interval (half the server's heartbeat),
/// independent of the state machine. Until ENTER_ROOM arrives the
/// interval is unknown and the loop just re-checks.
async fn heartbeat_loop(
    conn: Arc<WsClientConnection>,
    codec: BinaryCodec,
    state: Arc<Mutex<ClientState>>,
) {
    loop {
        let interval = lock(&state).heartbeat_interval_secs;
        match interval {
            // A sub-second server heartbeat advertises as 0 whole seconds;
            // fall back to the re-check cadence instead of spinning.
            Some(secs) if secs > 0.0 => {
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                let bytes = match encode_client(&codec, &ClientMessage::Ping) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, "PING failed to encode");
                        return;
                    }
                };
                if conn.send(&bytes).await.is_err() {
                    return;
                }
            }
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}
