//! `GridlockServer` builder and the server's long-lived tasks.
//!
//! This is the entry point for running a Gridlock server. It ties the
//! layers together (transport, protocol, session, room) and owns the
//! four task classes of the lifecycle engine:
//!
//! 1. the acceptor loop (this module),
//! 2. one receiver task per admitted player ([`crate::handler`]),
//! 3. the tick task driving the room state machine,
//! 4. the heartbeat sweep.
//!
//! A single `watch` channel cancels everything: the acceptor, tick, and
//! sweep tasks stop at their next wake, live sessions are closed so the
//! receivers fall out of their reads, and [`GridlockServer::run`] joins
//! every task before returning.

use std::sync::Arc;
use std::time::Duration;

use gridlock_protocol::{
    BinaryCodec, Codec, EnterRoomBody, ServerFrame, ServerMessage, StartEnterGameBody,
    encode_server,
};
use gridlock_room::{GameRoom, RoomConfig, RoomDirective, RosterView};
use gridlock_session::PlayerRegistry;
use gridlock_tick::{GameClock, TickConfig, TickScheduler};
use gridlock_transport::{Connection, Transport, WebSocketTransport, WsServerConnection};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;

use crate::GridlockError;
use crate::handler;

/// Server-level configuration. The room's own knobs live in
/// [`RoomConfig`]; everything here is about the surrounding machinery.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Heartbeat interval. Sessions silent for twice this are dropped,
    /// and the value (in whole seconds) is advertised to clients in
    /// ENTER_ROOM.
    pub heartbeat_interval: Duration,

    /// Minimum client-side pacing between PLAYER_INPUT sends. Accepted
    /// here for operator symmetry with the client; the server itself
    /// does not pace inputs.
    pub send_input_interval: Duration,

    /// Reserved tuning value, accepted but not interpreted.
    pub execution_duration: Duration,

    /// The room state machine's configuration.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:12345".to_string(),
            heartbeat_interval: Duration::from_secs(5),
            send_input_interval: Duration::from_secs(2),
            execution_duration: Duration::from_millis(500),
            room: RoomConfig::default(),
        }
    }
}

/// Shared server state passed to every task.
///
/// Two independently locked structures: the player registry and the room
/// state machine. Tasks never hold both locks at once: each lock is
/// taken, used, and released before the other is touched, which both
/// rules out deadlock and serializes every mutation path as the
/// lifecycle contract requires.
pub(crate) struct ServerState<K: Codec> {
    pub(crate) registry: Mutex<PlayerRegistry<WsServerConnection>>,
    pub(crate) room: Mutex<GameRoom>,
    pub(crate) codec: K,
    pub(crate) clock: GameClock,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Gridlock server.
///
/// # Example
///
/// ```rust,ignore
/// use gridlock::prelude::*;
///
/// let server = GridlockServerBuilder::new()
///     .bind("0.0.0.0:12345")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct GridlockServerBuilder {
    config: ServerConfig,
}

impl GridlockServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the transport and assembles the server.
    ///
    /// Uses [`BinaryCodec`] and [`WebSocketTransport`].
    pub async fn build(self) -> Result<GridlockServer<BinaryCodec>, GridlockError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let room_config = self.config.room.clone().validated();

        let state = Arc::new(ServerState {
            registry: Mutex::new(PlayerRegistry::new(room_config.max_players)),
            room: Mutex::new(GameRoom::new(room_config)),
            codec: BinaryCodec,
            clock: GameClock::new(),
            config: self.config,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(GridlockServer {
            transport,
            state,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }
}

impl Default for GridlockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Triggers server teardown from outside [`GridlockServer::run`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signals the server to stop. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// A running Gridlock server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GridlockServer<K: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<K>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<K: Codec> GridlockServer<K> {
    /// Creates a new builder.
    pub fn builder() -> GridlockServerBuilder {
        GridlockServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that can stop this server from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Runs the server until shutdown.
    ///
    /// Spawns the tick and heartbeat tasks, then accepts connections
    /// until the shutdown signal fires. Teardown closes every live
    /// session and waits for all tasks to quiesce.
    pub async fn run(mut self) -> Result<(), GridlockError> {
        tracing::info!(
            addr = ?self.local_addr().ok(),
            tick_rate = self.state.config.room.tick_rate,
            max_players = self.state.config.room.max_players,
            "Gridlock server running"
        );

        let mut tasks = JoinSet::new();
        tasks.spawn(tick_loop(Arc::clone(&self.state), self.shutdown_rx.clone()));
        tasks.spawn(heartbeat_loop(
            Arc::clone(&self.state),
            self.shutdown_rx.clone(),
        ));

        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                res = self.transport.accept() => match res {
                    Ok(conn) => {
                        admit_connection(&self.state, conn, &mut tasks).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("server stopping");
        self.transport.shutdown().await.ok();

        // Close every live session so the receiver tasks fall out of
        // their pending reads.
        let connections = self.state.registry.lock().await.connections();
        for conn in connections {
            conn.close().await.ok();
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("server stopped");
        Ok(())
    }
}

/// Admission: capacity check, id allocation, ENTER_ROOM, receiver spawn,
/// strictly in that order, so the new player's record exists before its
/// first message is read.
async fn admit_connection<K: Codec>(
    state: &Arc<ServerState<K>>,
    conn: WsServerConnection,
    tasks: &mut JoinSet<()>,
) {
    let conn = Arc::new(conn);
    let now = state.clock.now_ms();

    let admitted = {
        let mut registry = state.registry.lock().await;
        registry.admit(Arc::clone(&conn), now)
    };
    let player_id = match admitted {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(conn = %conn.id(), error = %e, "connection rejected");
            conn.close().await.ok();
            return;
        }
    };

    let body = EnterRoomBody {
        player_id,
        time_sync_times: state.config.room.time_sync_target,
        heartbeat_interval: state.config.heartbeat_interval.as_secs() as i32,
    };
    let frame = ServerFrame::ok(ServerMessage::EnterRoom(body));
    let delivered = match encode_server(&state.codec, &frame) {
        Ok(bytes) => conn.send(&bytes).await.map_err(GridlockError::from),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = delivered {
        tracing::warn!(%player_id, error = %e, "failed to deliver ENTER_ROOM");
        state.registry.lock().await.remove(player_id);
        conn.close().await.ok();
        return;
    }

    tracing::info!(%player_id, peer = ?conn.peer_addr(), "player connected");

    let state = Arc::clone(state);
    tasks.spawn(async move {
        handler::run_receiver(state, player_id, conn).await;
    });
}

/// The tick task: snapshots the roster, steps the room state machine,
/// and executes whatever it decided.
async fn tick_loop<K: Codec>(state: Arc<ServerState<K>>, mut shutdown: watch::Receiver<bool>) {
    let mut scheduler = TickScheduler::new(TickConfig::with_rate(state.config.room.tick_rate));
    let target = state.config.room.time_sync_target;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = scheduler.wait_for_tick() => {
                let now = state.clock.now_ms();

                let roster = {
                    let registry = state.registry.lock().await;
                    RosterView {
                        players: registry.ids(),
                        all_time_synced: registry.all_time_synced(target),
                        all_ready: registry.all_ready(),
                    }
                };

                let directives = {
                    let mut room = state.room.lock().await;
                    room.tick(now, &roster)
                };

                for directive in directives {
                    execute_directive(&state, directive).await;
                }
                scheduler.record_tick_end();
            }
        }
    }
}

async fn execute_directive<K: Codec>(state: &Arc<ServerState<K>>, directive: RoomDirective) {
    match directive {
        RoomDirective::EnterLoadPhase { roster } => {
            {
                let mut registry = state.registry.lock().await;
                for spawn in &roster {
                    registry.set_position(spawn.player_id, spawn.position).ok();
                }
            }
            tracing::info!(players = roster.len(), "lobby complete, broadcasting roster");
            broadcast(
                state,
                ServerMessage::StartEnterGame(StartEnterGameBody { players: roster }),
            )
            .await;
        }

        RoomDirective::BeginCountdown { appointed_time } => {
            tracing::info!(appointed_time, "all players loaded, broadcasting start");
            broadcast(
                state,
                ServerMessage::StartGame(gridlock_protocol::StartGameBody {
                    appointed_server_time: appointed_time,
                }),
            )
            .await;
        }

        RoomDirective::WorldSync(body) => {
            broadcast(state, ServerMessage::WorldSync(body)).await;
        }

        RoomDirective::InputsDue(inputs) => {
            // Relay already happened on receipt; nothing is simulated
            // server-side in this revision.
            tracing::trace!(count = inputs.len(), "inputs reached their frame");
        }
    }
}

/// Encodes one frame and fans it out to every admitted player.
async fn broadcast<K: Codec>(state: &Arc<ServerState<K>>, msg: ServerMessage) {
    match encode_server(&state.codec, &ServerFrame::ok(msg)) {
        Ok(bytes) => state.registry.lock().await.broadcast(&bytes).await,
        Err(e) => tracing::error!(error = %e, "broadcast frame failed to encode"),
    }
}

/// The heartbeat sweep: every interval, drop players whose sessions have
/// been silent longer than twice the interval.
async fn heartbeat_loop<K: Codec>(state: Arc<ServerState<K>>, mut shutdown: watch::Receiver<bool>) {
    let interval = state.config.heartbeat_interval;
    let interval_ms = interval.as_millis() as i64;
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let now = state.clock.now_ms();
                let stale = {
                    let registry = state.registry.lock().await;
                    registry.stale_ids(now, interval_ms)
                };
                for player_id in stale {
                    let record = {
                        let mut registry = state.registry.lock().await;
                        registry.remove(player_id)
                    };
                    if let Some(record) = record {
                        tracing::warn!(%player_id, "heartbeat timeout, dropping session");
                        record.connection.close().await.ok();
                    }
                }
            }
        }
    }
}
