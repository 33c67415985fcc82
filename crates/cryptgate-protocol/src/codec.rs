//! JSON framing for the wire protocol.
//!
//! Messages travel as JSON text frames over the WebSocket. JSON keeps the
//! protocol inspectable from browser DevTools, which matters far more for a
//! canvas client than the byte savings of a binary format would.

#![cfg(feature = "json")]

use crate::{ClientMessage, ProtocolError, ServerMessage};

/// Serializes a server message into a JSON text frame.
pub fn encode(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(ProtocolError::Encode)
}

/// Parses an incoming frame as a client message.
pub fn decode(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}
