//! Error types for the repository layer.

use cryptgate_protocol::{PlayerId, RoomId};

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No room with this id exists.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// No player with this id exists.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
}
