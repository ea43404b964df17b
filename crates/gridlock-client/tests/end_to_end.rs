//! End-to-end test: two real clients against a real server over loopback.
//!
//! Walks the complete lifecycle (admission, time sync, load, countdown,
//! lockstep) and verifies that a movement captured on one client shows
//! up on both replica grids.

use std::time::Duration;

use gridlock::prelude::*;
use gridlock_client::{ClientConfig, ClientHandle, ClientPhase, GameClient, UiEvent};
use tokio::sync::mpsc;

fn server_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        heartbeat_interval: Duration::from_secs(5),
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

fn client_config(addr: &str) -> ClientConfig {
    ClientConfig {
        server_addr: addr.to_string(),
        // Tight pacing so the test doesn't wait out the 2 s default.
        send_input_interval: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

async fn start_server() -> (String, ShutdownHandle) {
    let server = GridlockServerBuilder::new()
        .config(server_config())
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap().to_string();
    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, handle)
}

/// Polls until `pred` holds, failing the test after `secs`.
async fn wait_for(secs: u64, what: &str, mut pred: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    while !pred() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

struct RunningClient {
    handle: ClientHandle,
    ui: mpsc::UnboundedReceiver<UiEvent>,
    task: tokio::task::JoinHandle<Result<(), gridlock_client::ClientError>>,
}

async fn launch_client(addr: &str) -> RunningClient {
    let (client, ui) = GameClient::connect(client_config(addr))
        .await
        .expect("client should connect");
    let handle = client.handle();
    let task = tokio::spawn(client.run());
    RunningClient { handle, ui, task }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_clients_play_in_lockstep() {
    let (addr, server) = start_server().await;

    let mut a = launch_client(&addr).await;
    let b = launch_client(&addr).await;

    // Both clients walk the lifecycle on their own: time sync, load,
    // countdown. The load delay is randomized at 0.5–2.5 s, so allow
    // generous wall time.
    wait_for(15, "both clients in Game", || {
        a.handle.phase() == ClientPhase::Game && b.handle.phase() == ClientPhase::Game
    })
    .await;

    assert_eq!(a.handle.player_id(), Some(PlayerId(1)));
    assert_eq!(b.handle.player_id(), Some(PlayerId(2)));

    // Both replicas exist on both clients, at the same spawn positions.
    let a1 = a.handle.position_of(PlayerId(1)).expect("replica of P1 on A");
    let b1 = b.handle.position_of(PlayerId(1)).expect("replica of P1 on B");
    assert_eq!(a1, b1, "spawns must agree across clients");

    // A captures a movement; the relay must move P1 on both grids.
    a.handle.send_movement(1, 0).expect("movement captured");
    let expected = a1.offset(1, 0);
    wait_for(10, "replica of P1 moved on both clients", || {
        a.handle.position_of(PlayerId(1)) == Some(expected)
            && b.handle.position_of(PlayerId(1)) == Some(expected)
    })
    .await;

    // The UI stream saw the binding and the move on client A.
    let mut saw_binding = false;
    let mut saw_move = false;
    while let Ok(event) = a.ui.try_recv() {
        match event {
            UiEvent::LocalPlayerBound(id) => saw_binding = id == PlayerId(1),
            UiEvent::ReplicaMoved { id, position } => {
                saw_move |= id == PlayerId(1) && position == expected;
            }
            _ => {}
        }
    }
    assert!(saw_binding, "UI must learn the local player binding");
    assert!(saw_move, "UI must see the replica move");

    // Logic frames advance once world syncs start flowing.
    wait_for(10, "logic frames advancing", || a.handle.logic_frame() > 0).await;

    // Server teardown errors out both clients (the defined exit path).
    server.shutdown();
    let res_a = tokio::time::timeout(Duration::from_secs(5), a.task)
        .await
        .expect("client A should stop")
        .expect("join");
    assert!(res_a.is_err(), "client exits with the receiver's error");
    let res_b = tokio::time::timeout(Duration::from_secs(5), b.task)
        .await
        .expect("client B should stop")
        .expect("join");
    assert!(res_b.is_err());

    drop(b.ui);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_out_of_bounds_movement_never_escapes_grid() {
    let (addr, server) = start_server().await;

    let a = launch_client(&addr).await;
    let b = launch_client(&addr).await;

    wait_for(15, "both clients in Game", || {
        a.handle.phase() == ClientPhase::Game && b.handle.phase() == ClientPhase::Game
    })
    .await;

    // Hammer leftward far past the wall; the replica must stop at x = 0.
    for _ in 0..12 {
        a.handle.send_movement(-1, 0).ok();
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    wait_for(10, "replica pinned at the left wall", || {
        matches!(a.handle.position_of(PlayerId(1)), Some(pos) if pos.x == 0)
    })
    .await;
    let pos = a.handle.position_of(PlayerId(1)).unwrap();
    assert!(pos.x >= 0 && pos.y >= 0, "replica inside the grid: {pos:?}");

    server.shutdown();
    a.task.abort();
    b.task.abort();
}
