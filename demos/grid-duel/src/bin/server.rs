//! Grid-duel server: a Gridlock coordinator for a 10×10 lockstep duel.
//!
//! Runs until Ctrl-C, then tears the lobby down cleanly.

use std::time::Duration;

use clap::Parser;
use gridlock::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:12345")]
    bind: String,

    /// Server tick rate in Hz.
    #[arg(long, default_value_t = 50)]
    tick_rate: u32,

    /// Lobby size: the game starts once this many players are in.
    #[arg(long, default_value_t = 2)]
    max_players: usize,

    /// Heartbeat interval in seconds.
    #[arg(long, default_value_t = 5)]
    heartbeat: u64,

    /// Time-sync rounds each client must complete.
    #[arg(long, default_value_t = 10)]
    time_sync_times: i32,

    /// Seconds between "everyone loaded" and the appointed start.
    #[arg(long, default_value_t = 3)]
    appointed_delay: u64,

    /// Client input pacing in seconds (advertised, not enforced here).
    #[arg(long, default_value_t = 2.0)]
    send_input_interval: f64,

    /// Reserved tuning value in seconds.
    #[arg(long, default_value_t = 0.5)]
    execution_duration: f64,

    /// Map dimensions.
    #[arg(long, default_value_t = 10)]
    map_width: i32,
    #[arg(long, default_value_t = 10)]
    map_height: i32,
}

#[tokio::main]
async fn main() -> Result<(), GridlockError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: args.bind,
        heartbeat_interval: Duration::from_secs(args.heartbeat),
        send_input_interval: Duration::from_secs_f64(args.send_input_interval),
        execution_duration: Duration::from_secs_f64(args.execution_duration),
        room: RoomConfig {
            tick_rate: args.tick_rate,
            max_players: args.max_players,
            time_sync_target: args.time_sync_times,
            appointed_delay: Duration::from_secs(args.appointed_delay),
            map_width: args.map_width,
            map_height: args.map_height,
        },
    };

    let server = GridlockServerBuilder::new().config(config).build().await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await
}
