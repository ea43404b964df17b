//! Grid-duel client: connects to a Gridlock server, renders the replica
//! grid to the console, and (optionally) wanders on its own.
//!
//! Without `--auto-move`, drive the local player from stdin:
//! `w`/`a`/`s`/`d` + Enter.

use std::time::Duration;

use clap::Parser;
use gridlock_client::{ClientConfig, ClientHandle, ClientPhase, GameClient, UiEvent};
use tokio::io::AsyncBufReadExt;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address to connect to.
    #[arg(long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Seconds between PLAYER_INPUT sends.
    #[arg(long, default_value_t = 2.0)]
    send_input_interval: f64,

    /// Wander randomly instead of reading stdin.
    #[arg(long, default_value_t = false)]
    auto_move: bool,

    /// Map dimensions (must match the server).
    #[arg(long, default_value_t = 10)]
    map_width: i32,
    #[arg(long, default_value_t = 10)]
    map_height: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ClientConfig {
        server_addr: args.server,
        send_input_interval: Duration::from_secs_f64(args.send_input_interval),
        map_width: args.map_width,
        map_height: args.map_height,
        ..ClientConfig::default()
    };

    let (client, mut ui) = GameClient::connect(config).await?;
    let handle = client.handle();

    // UI task: narrate lifecycle and replica updates.
    tokio::spawn(async move {
        while let Some(event) = ui.recv().await {
            match event {
                UiEvent::LocalPlayerBound(id) => println!("you are {id}"),
                UiEvent::PhaseChanged(phase) => println!("phase: {phase}"),
                UiEvent::ReplicaSpawned { id, position } => {
                    println!("{id} spawned at {position}");
                }
                UiEvent::ReplicaMoved { id, position } => {
                    println!("{id} moved to {position}");
                }
            }
        }
    });

    if args.auto_move {
        tokio::spawn(auto_move(handle));
    } else {
        tokio::spawn(read_stdin(handle));
    }

    // Runs until the server goes away or a protocol violation occurs.
    match client.run().await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "session ended");
            Err(err.into())
        }
    }
}

/// Wanders one step in a rotating direction every couple of seconds.
async fn auto_move(handle: ClientHandle) {
    let steps = [(1, 0), (0, 1), (-1, 0), (0, -1)];
    let mut i = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        if handle.phase() == ClientPhase::Game {
            let (dx, dy) = steps[i % steps.len()];
            i += 1;
            handle.send_movement(dx, dy).ok();
        }
    }
}

/// Maps `w`/`a`/`s`/`d` lines from stdin to movement captures.
async fn read_stdin(handle: ClientHandle) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let step = match line.trim() {
            "w" => Some((0, -1)),
            "s" => Some((0, 1)),
            "a" => Some((-1, 0)),
            "d" => Some((1, 0)),
            _ => None,
        };
        match step {
            Some((dx, dy)) => {
                if let Err(e) = handle.send_movement(dx, dy) {
                    println!("rejected: {e}");
                }
            }
            None => println!("use w/a/s/d"),
        }
    }
}
