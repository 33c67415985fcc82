//! Per-connection handler: socket upgrade, frame loop, dispatch.
//!
//! Each accepted TCP connection gets its own task running this handler.
//! The socket is split in two: a writer task that drains the connection's
//! outbound channel into the sink (so broadcasts from tick loops never
//! touch the socket directly), and the read loop below that decodes
//! frames and dispatches them. Malformed frames are logged and dropped;
//! the connection stays open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cryptgate_protocol::{ClientMessage, ServerMessage};
use cryptgate_registry::{ConnectionId, Outbound};
use cryptgate_sim::InputFrame;
use cryptgate_store::RoomStore;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::lobby::LobbyError;
use crate::server::ServerState;
use crate::CryptgateError;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S: RoomStore>(
    stream: TcpStream,
    state: Arc<ServerState<S>>,
) -> Result<(), CryptgateError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let conn_id =
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%conn_id, "websocket connection open");

    let (mut sink, mut reader) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Writer task: sole owner of the sink. Ends when every sender (this
    // handler plus the registry's copy) is gone, or the peer breaks.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(incoming) = reader.next().await {
        let msg = match incoming {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "read error");
                break;
            }
        };
        let data = match &msg {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(bytes) => bytes.as_ref(),
            Message::Close(_) => break,
            _ => continue, // ping/pong handled by tungstenite
        };

        match cryptgate_protocol::decode(data) {
            Ok(client_msg) => {
                dispatch(conn_id, &tx, client_msg, &state).await;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "malformed frame dropped");
            }
        }
    }

    // Disconnect cleanup: unbind, update the lobby, maybe stop a loop.
    if let Err(e) = state.lobby.disconnect(conn_id).await {
        tracing::warn!(%conn_id, error = %e, "disconnect cleanup failed");
    }
    drop(tx); // last sender for an unbound connection → writer exits
    let _ = writer.await;

    tracing::debug!(%conn_id, "connection closed");
    Ok(())
}

/// Routes one decoded message. Guard rejections go back to the requester
/// as `error` frames; internal faults are logged and reported generically.
async fn dispatch<S: RoomStore>(
    conn_id: ConnectionId,
    tx: &Outbound,
    msg: ClientMessage,
    state: &Arc<ServerState<S>>,
) {
    let result = match msg {
        ClientMessage::Join {
            code,
            name,
            session_id,
        } => state
            .lobby
            .join(conn_id, tx.clone(), &code, &name, session_id.as_ref())
            .await
            .map(|_| ()),

        ClientMessage::SelectRole { role } => {
            state.lobby.select_role(conn_id, role).await
        }

        ClientMessage::Ready { is_ready } => {
            state.lobby.set_ready(conn_id, is_ready).await
        }

        ClientMessage::StartGame => state.lobby.start_game(conn_id).await,

        ClientMessage::Input { x, y, attack } => {
            // Hot path: no repository, just queue into the room's loop.
            // Input outside an active game is silently dropped.
            if let Some(binding) = state.registry.binding(conn_id) {
                if let Some(handle) = state.supervisor.handle(binding.room_id)
                {
                    handle.input(
                        binding.session_id,
                        InputFrame { x, y, attack },
                    );
                }
            }
            Ok(())
        }
    };

    if let Err(err) = result {
        let message = match &err {
            LobbyError::Store(e) => {
                tracing::error!(%conn_id, error = %e, "repository fault");
                "internal error".to_string()
            }
            LobbyError::Protocol(e) => {
                tracing::error!(%conn_id, error = %e, "framing fault");
                "internal error".to_string()
            }
            rejection => rejection.to_string(),
        };
        send(tx, &ServerMessage::Error { message });
    }
}

/// Encodes and queues a frame for this connection only.
fn send(tx: &Outbound, msg: &ServerMessage) {
    match cryptgate_protocol::encode(msg) {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(e) => tracing::error!(error = %e, "encode failed"),
    }
}
