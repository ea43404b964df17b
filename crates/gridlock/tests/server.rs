//! Integration tests for the full server lifecycle over loopback.
//!
//! These drive raw protocol sessions (dial + encode/decode) against a real
//! server, covering the canonical scenarios: admission and roster,
//! countdown, input relay, heartbeat timeout, capacity rejection, and
//! out-of-order input handling.

use std::sync::Arc;
use std::time::Duration;

use gridlock::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

/// The canonical test configuration: 50 Hz, 2 players, time-sync target 3,
/// 1 s appointed delay.
fn test_config(heartbeat: Duration) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        heartbeat_interval: heartbeat,
        room: RoomConfig {
            tick_rate: 50,
            max_players: 2,
            time_sync_target: 3,
            appointed_delay: Duration::from_secs(1),
            map_width: 10,
            map_height: 10,
        },
        ..ServerConfig::default()
    }
}

/// Starts a server on a random port. Returns its address and a shutdown
/// handle (dropped servers would otherwise run for the whole test binary).
async fn start_server(config: ServerConfig) -> (String, ShutdownHandle) {
    let server = GridlockServerBuilder::new()
        .config(config)
        .build()
        .await
        .expect("server should build");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let handle = server.shutdown_handle();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, handle)
}

/// A raw protocol session for driving the server directly.
struct TestClient {
    conn: Arc<WsClientConnection>,
    codec: BinaryCodec,
}

impl TestClient {
    async fn dial(addr: &str) -> Self {
        Self {
            conn: WsClientConnection::dial(addr).await.expect("should dial"),
            codec: BinaryCodec,
        }
    }

    async fn send(&self, msg: &ClientMessage) {
        let bytes = encode_client(&self.codec, msg).expect("encode");
        self.conn.send(&bytes).await.expect("send");
    }

    /// Receives the next frame, failing the test after 5 s.
    async fn recv(&self) -> ServerFrame {
        let data = tokio::time::timeout(Duration::from_secs(5), self.conn.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("recv should succeed")
            .expect("peer closed unexpectedly");
        decode_server(&self.codec, &data).expect("decode")
    }

    /// Receives frames until `pred` matches, skipping the rest.
    async fn recv_until<F: Fn(&ServerMessage) -> bool>(&self, pred: F) -> ServerMessage {
        loop {
            let frame = self.recv().await;
            if pred(&frame.msg) {
                return frame.msg;
            }
        }
    }

    /// The raw read result, for asserting closes. Generous timeout: the
    /// heartbeat sweep may take up to three intervals to fire.
    async fn recv_raw(&self) -> Option<Vec<u8>> {
        tokio::time::timeout(Duration::from_secs(10), self.conn.recv())
            .await
            .expect("timed out waiting for close")
            .unwrap_or(None)
    }

    fn expect_enter_room(frame: &ServerFrame) -> EnterRoomBody {
        match frame.msg {
            ServerMessage::EnterRoom(body) => body,
            ref other => panic!("expected EnterRoom, got {other:?}"),
        }
    }

    /// Runs the required time-sync rounds.
    async fn sync_clock(&self, rounds: i32) -> i64 {
        let mut last_server_time = 0;
        for _ in 0..rounds {
            self.send(&ClientMessage::RequestTime).await;
            match self.recv().await.msg {
                ServerMessage::ResponseTime(body) => {
                    assert!(body.server_time >= last_server_time);
                    last_server_time = body.server_time;
                }
                other => panic!("expected ResponseTime, got {other:?}"),
            }
        }
        last_server_time
    }
}

/// Connects two clients and walks them through admission and time sync,
/// up to (and including) the START_ENTER_GAME broadcast.
async fn lobby(addr: &str) -> (TestClient, TestClient, StartEnterGameBody) {
    let c1 = TestClient::dial(addr).await;
    let enter1 = TestClient::expect_enter_room(&c1.recv().await);
    assert_eq!(enter1.player_id, PlayerId(1));

    let c2 = TestClient::dial(addr).await;
    let enter2 = TestClient::expect_enter_room(&c2.recv().await);
    assert_eq!(enter2.player_id, PlayerId(2));

    c1.sync_clock(enter1.time_sync_times).await;
    c2.sync_clock(enter2.time_sync_times).await;

    let roster1 = match c1
        .recv_until(|m| matches!(m, ServerMessage::StartEnterGame(_)))
        .await
    {
        ServerMessage::StartEnterGame(body) => body,
        _ => unreachable!(),
    };
    let roster2 = match c2
        .recv_until(|m| matches!(m, ServerMessage::StartEnterGame(_)))
        .await
    {
        ServerMessage::StartEnterGame(body) => body,
        _ => unreachable!(),
    };
    assert_eq!(roster1, roster2, "both clients see the same roster");

    (c1, c2, roster1)
}

/// Walks two clients all the way into the running game.
async fn running_game(addr: &str) -> (TestClient, TestClient) {
    let (c1, c2, _) = lobby(addr).await;
    c1.send(&ClientMessage::GameLoaded).await;
    c2.send(&ClientMessage::GameLoaded).await;

    for c in [&c1, &c2] {
        c.recv_until(|m| matches!(m, ServerMessage::StartGame(_)))
            .await;
    }

    // The first WORLD_SYNC proves the appointed instant has passed and
    // the frame loop is running.
    for c in [&c1, &c2] {
        c.recv_until(|m| matches!(m, ServerMessage::WorldSync(_)))
            .await;
    }
    (c1, c2)
}

// =========================================================================
// Scenario 1: admission & roster
// =========================================================================

#[tokio::test]
async fn test_admission_and_roster() {
    let (addr, server) = start_server(test_config(Duration::from_secs(2))).await;

    let c1 = TestClient::dial(&addr).await;
    let enter1 = TestClient::expect_enter_room(&c1.recv().await);
    assert_eq!(enter1.player_id, PlayerId(1));
    assert_eq!(enter1.time_sync_times, 3);
    assert_eq!(enter1.heartbeat_interval, 2);

    let c2 = TestClient::dial(&addr).await;
    let enter2 = TestClient::expect_enter_room(&c2.recv().await);
    assert_eq!(enter2.player_id, PlayerId(2));

    // Three sync rounds each, then the roster broadcast.
    c1.sync_clock(3).await;
    c2.sync_clock(3).await;

    let roster = match c1
        .recv_until(|m| matches!(m, ServerMessage::StartEnterGame(_)))
        .await
    {
        ServerMessage::StartEnterGame(body) => body,
        _ => unreachable!(),
    };

    assert_eq!(roster.players.len(), 2);
    assert_ne!(
        roster.players[0].position, roster.players[1].position,
        "spawn positions must be distinct"
    );
    for spawn in &roster.players {
        assert!((1..9).contains(&spawn.position.x), "interior x: {spawn:?}");
        assert!((1..9).contains(&spawn.position.y), "interior y: {spawn:?}");
    }

    server.shutdown();
}

// =========================================================================
// Scenario 2: countdown
// =========================================================================

#[tokio::test]
async fn test_countdown_to_appointed_start() {
    let (addr, server) = start_server(test_config(Duration::from_secs(2))).await;
    let (c1, c2, _) = lobby(&addr).await;

    c1.send(&ClientMessage::GameLoaded).await;
    c2.send(&ClientMessage::GameLoaded).await;

    let mut appointed = 0;
    for c in [&c1, &c2] {
        match c
            .recv_until(|m| matches!(m, ServerMessage::StartGame(_)))
            .await
        {
            ServerMessage::StartGame(body) => {
                assert!(body.appointed_server_time >= 1000, "appointed = now + 1s");
                if appointed == 0 {
                    appointed = body.appointed_server_time;
                } else {
                    assert_eq!(
                        body.appointed_server_time, appointed,
                        "both clients get the same instant"
                    );
                }
            }
            _ => unreachable!(),
        }
    }

    // The first WORLD_SYNC carries a server_time at or past the appointed
    // instant, proving the gate held until the agreed start.
    match c1
        .recv_until(|m| matches!(m, ServerMessage::WorldSync(_)))
        .await
    {
        ServerMessage::WorldSync(body) => {
            assert!(body.server_time >= appointed);
            assert!(body.logic_frame >= 1);
        }
        _ => unreachable!(),
    }

    server.shutdown();
}

// =========================================================================
// Scenario 3: input relay
// =========================================================================

#[tokio::test]
async fn test_input_relayed_to_all_players() {
    let (addr, server) = start_server(test_config(Duration::from_secs(5))).await;
    let (c1, c2) = running_game(&addr).await;

    let input = PlayerInputBody::movement(PlayerId(1), 1, CommandKind::MoveRight);
    c1.send(&ClientMessage::PlayerInput(input.clone())).await;

    for c in [&c1, &c2] {
        match c
            .recv_until(|m| matches!(m, ServerMessage::PlayerInputSync(_)))
            .await
        {
            ServerMessage::PlayerInputSync(body) => {
                assert_eq!(body, input, "relay must forward the payload unchanged");
            }
            _ => unreachable!(),
        }
    }

    server.shutdown();
}

// =========================================================================
// Scenario 4: heartbeat timeout
// =========================================================================

#[tokio::test]
async fn test_silent_player_dropped_after_double_heartbeat() {
    let (addr, server) = start_server(test_config(Duration::from_secs(2))).await;

    let c1 = TestClient::dial(&addr).await;
    let _ = TestClient::expect_enter_room(&c1.recv().await);

    // Send nothing at all. After > 2 · 2 s of silence the sweep closes
    // the session.
    let closed = c1.recv_raw().await;
    assert!(closed.is_none(), "expected a close, got {closed:?}");

    server.shutdown();
}

#[tokio::test]
async fn test_active_player_survives_the_sweep() {
    let (addr, server) = start_server(test_config(Duration::from_millis(500))).await;

    let c1 = TestClient::dial(&addr).await;
    let _ = TestClient::expect_enter_room(&c1.recv().await);

    // Ping well inside every timeout window; the session must stay up.
    for _ in 0..6 {
        c1.send(&ClientMessage::Ping).await;
        match c1.recv().await.msg {
            ServerMessage::Pong => {}
            other => panic!("expected Pong, got {other:?}"),
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    server.shutdown();
}

// =========================================================================
// Scenario 5: capacity rejection
// =========================================================================

#[tokio::test]
async fn test_third_connection_closed_without_enter_room() {
    let (addr, server) = start_server(test_config(Duration::from_secs(2))).await;

    let c1 = TestClient::dial(&addr).await;
    let _ = c1.recv().await;
    let c2 = TestClient::dial(&addr).await;
    let _ = c2.recv().await;

    // Accepted at the transport layer, then closed immediately.
    let c3 = TestClient::dial(&addr).await;
    let first = c3.recv_raw().await;
    assert!(
        first.is_none(),
        "over-capacity connection must be closed without ENTER_ROOM"
    );

    server.shutdown();
}

// =========================================================================
// Scenario 6: out-of-order input
// =========================================================================

#[tokio::test]
async fn test_future_input_still_broadcast_immediately() {
    let (addr, server) = start_server(test_config(Duration::from_secs(5))).await;
    let (c1, c2) = running_game(&addr).await;

    // Stamped far ahead of the current logic frame: held in the server
    // queue (see the room lifecycle tests) but relayed right away.
    let input = PlayerInputBody::movement(PlayerId(1), 10_000, CommandKind::MoveUp);
    c1.send(&ClientMessage::PlayerInput(input.clone())).await;

    let relayed = c2
        .recv_until(|m| matches!(m, ServerMessage::PlayerInputSync(_)))
        .await;
    assert_eq!(relayed, ServerMessage::PlayerInputSync(input));

    server.shutdown();
}

// =========================================================================
// World sync monotonicity
// =========================================================================

#[tokio::test]
async fn test_world_sync_frames_are_monotonic() {
    let (addr, server) = start_server(test_config(Duration::from_secs(5))).await;
    let (c1, _c2) = running_game(&addr).await;

    let mut last_frame = 0;
    for _ in 0..3 {
        match c1
            .recv_until(|m| matches!(m, ServerMessage::WorldSync(_)))
            .await
        {
            ServerMessage::WorldSync(body) => {
                assert!(
                    body.logic_frame > last_frame,
                    "world sync frames must advance"
                );
                last_frame = body.logic_frame;
            }
            _ => unreachable!(),
        }
    }

    server.shutdown();
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_quiesces_and_closes_sessions() {
    let server = GridlockServerBuilder::new()
        .config(test_config(Duration::from_secs(2)))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap().to_string();
    let handle = server.shutdown_handle();
    let run = tokio::spawn(server.run());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let c1 = TestClient::dial(&addr).await;
    let _ = c1.recv().await;

    handle.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run() should return after shutdown")
        .expect("task should join");
    assert!(result.is_ok());

    let closed = c1.recv_raw().await;
    assert!(closed.is_none(), "sessions should be closed at shutdown");
}
