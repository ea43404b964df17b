//! Per-session receiver: reads envelopes, dispatches commands.
//!
//! Each admitted player gets one receiver task running [`run_receiver`].
//! The loop reads one whole envelope at a time, refreshes the player's
//! activity stamp, and dispatches by command. Per-message decode problems
//! drop the message; an unreadable envelope or transport failure ends the
//! task. Either way the [`SessionGuard`] tears the session down: even if
//! a handler panics, only this player's session dies.

use std::sync::Arc;

use gridlock_protocol::{
    ClientMessage, Codec, PlayerId, ResponseTimeBody, ServerFrame, ServerMessage, encode_server,
};
use gridlock_transport::{Connection, WsServerConnection};

use crate::GridlockError;
use crate::server::ServerState;

/// Drop guard that removes the player and closes the session when the
/// receiver exits, on clean EOF, error, and panic alike. `Drop`
/// is synchronous, so the async cleanup runs on a fire-and-forget task.
struct SessionGuard<K: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<K>>,
}

impl<K: Codec> Drop for SessionGuard<K> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let record = state.registry.lock().await.remove(player_id);
            if let Some(record) = record {
                record.connection.close().await.ok();
                tracing::info!(%player_id, "player disconnected");
            }
        });
    }
}

/// Runs one player's receive loop until the session ends.
pub(crate) async fn run_receiver<K: Codec>(
    state: Arc<ServerState<K>>,
    player_id: PlayerId,
    conn: Arc<WsServerConnection>,
) {
    let _guard = SessionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "session closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "session read failed");
                break;
            }
        };

        // Any successfully read envelope counts as activity.
        {
            let mut registry = state.registry.lock().await;
            let _ = registry.touch(player_id, state.clock.now_ms());
        }

        let msg = match gridlock_protocol::decode_client(&state.codec, &data) {
            Ok(msg) => msg,
            Err(e) if e.is_fatal() => {
                tracing::warn!(%player_id, error = %e, "unreadable envelope, dropping session");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "message dropped");
                continue;
            }
        };

        if let Err(e) = dispatch(&state, player_id, &conn, msg).await {
            tracing::debug!(%player_id, error = %e, "dispatch failed, dropping session");
            break;
        }
    }

    // _guard drops here → record removal and session close.
}

/// Handles one decoded client message.
async fn dispatch<K: Codec>(
    state: &Arc<ServerState<K>>,
    player_id: PlayerId,
    conn: &Arc<WsServerConnection>,
    msg: ClientMessage,
) -> Result<(), GridlockError> {
    match msg {
        ClientMessage::Ping => {
            reply(state, conn, ServerMessage::Pong).await?;
        }

        ClientMessage::RequestTime => {
            let target = state.config.room.time_sync_target;
            {
                let mut registry = state.registry.lock().await;
                registry.record_time_sync(player_id, target)?;
            }
            let body = ResponseTimeBody {
                server_time: state.clock.now_ms(),
            };
            reply(state, conn, ServerMessage::ResponseTime(body)).await?;
        }

        ClientMessage::PlayerInfo => {
            tracing::trace!(%player_id, "player info accepted");
        }

        ClientMessage::GameLoaded => {
            let mut registry = state.registry.lock().await;
            registry.mark_ready(player_id)?;
        }

        ClientMessage::PlayerInput(body) => {
            // Queue for the frame loop, then relay to everyone at once.
            // The broadcast finishes before this task reads again, so the
            // relay order per sender matches arrival order.
            {
                let mut room = state.room.lock().await;
                room.queue_input(body.clone());
            }
            let bytes = encode_server(
                &state.codec,
                &ServerFrame::ok(ServerMessage::PlayerInputSync(body)),
            )?;
            let registry = state.registry.lock().await;
            registry.broadcast(&bytes).await;
        }
    }

    Ok(())
}

/// Encodes and sends one frame back to the originating session.
async fn reply<K: Codec>(
    state: &Arc<ServerState<K>>,
    conn: &Arc<WsServerConnection>,
    msg: ServerMessage,
) -> Result<(), GridlockError> {
    let bytes = encode_server(&state.codec, &ServerFrame::ok(msg))?;
    conn.send(&bytes).await?;
    Ok(())
}
