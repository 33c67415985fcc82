//! Buffered player input.
//!
//! Clients send intents faster than the simulation ticks. The buffer
//! collapses them: the latest movement vector per session wins, and an
//! attack trigger stays set until the next tick consumes it, so a click
//! between ticks is never lost.

use std::collections::HashMap;

use cryptgate_protocol::SessionId;

/// One tick's worth of intent for one player. The vector is raw client
/// input — not necessarily unit length, not even necessarily finite.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub x: f32,
    pub y: f32,
    pub attack: bool,
}

/// Accumulates intents between ticks.
#[derive(Debug, Default)]
pub struct InputBuffer {
    frames: HashMap<SessionId, InputFrame>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an intent. Movement replaces any earlier value this tick;
    /// attack is sticky until drained.
    pub fn push(&mut self, session_id: SessionId, frame: InputFrame) {
        let entry = self.frames.entry(session_id).or_default();
        entry.x = frame.x;
        entry.y = frame.y;
        entry.attack |= frame.attack;
    }

    /// Takes everything buffered so far, leaving the buffer empty.
    pub fn drain(&mut self) -> HashMap<SessionId, InputFrame> {
        std::mem::take(&mut self.frames)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
