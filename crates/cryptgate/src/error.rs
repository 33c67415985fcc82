//! Unified error type for the server crate.

use cryptgate_protocol::ProtocolError;
use cryptgate_store::StoreError;

use crate::LobbyError;

/// Top-level error that wraps the layer-specific errors.
///
/// The `#[from]` attributes let `?` convert lower-layer errors
/// automatically, so callers deal with one type.
#[derive(Debug, thiserror::Error)]
pub enum CryptgateError {
    /// A framing error (encode/decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A repository error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A lobby state-machine rejection.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A socket-level error during the WebSocket handshake or transfer.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An I/O error binding or accepting on the listener.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
