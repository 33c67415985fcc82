//! The session registry: which connection is in which room.
//!
//! Every live WebSocket is bound to at most one `(room, session)` pair.
//! The registry answers "who is in room R" for targeted broadcast and
//! holds each connection's outbound channel so fan-out never touches a
//! socket directly — a slow client drains its own channel on its own
//! writer task and can never stall a simulation tick.
//!
//! # Concurrency note
//!
//! State lives behind a single `RwLock`. Bindings are mutated only from
//! the owning connection's task; broadcasts from many room tasks take the
//! read lock concurrently. The lock guards map access only — it is never
//! held across an await, and sending on the unbounded channels inside it
//! never blocks.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use cryptgate_protocol::{RoomId, SessionId};
use tokio::sync::mpsc;

/// Opaque identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Channel sender delivering outbound frames to one connection's writer
/// task. Unbounded: a send never waits, and a dropped receiver just makes
/// sends fail, which fan-out treats as "connection gone".
pub type Outbound = mpsc::UnboundedSender<String>;

/// A connection's room and session identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub session_id: SessionId,
}

#[derive(Default)]
struct Inner {
    bindings: HashMap<ConnectionId, Binding>,
    /// Membership index per room; kept in sync with `bindings`.
    rooms: HashMap<RoomId, HashMap<ConnectionId, Member>>,
}

struct Member {
    session_id: SessionId,
    outbound: Outbound,
}

/// Maps live connections to rooms and fans frames out to room members.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a connection to a room. Idempotent — any prior binding for
    /// this connection is replaced, including its membership entry.
    pub fn bind(
        &self,
        conn: ConnectionId,
        room_id: RoomId,
        session_id: SessionId,
        outbound: Outbound,
    ) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(prev) = inner.bindings.remove(&conn) {
            remove_member(&mut inner, prev.room_id, conn);
        }
        inner.bindings.insert(
            conn,
            Binding {
                room_id,
                session_id: session_id.clone(),
            },
        );
        inner.rooms.entry(room_id).or_default().insert(
            conn,
            Member {
                session_id,
                outbound,
            },
        );
        tracing::debug!(%conn, %room_id, "connection bound");
    }

    /// Removes a connection's binding and returns it, if there was one.
    /// Unbound connections are not an error — sockets may close before
    /// ever joining a room.
    pub fn unbind(&self, conn: ConnectionId) -> Option<Binding> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let binding = inner.bindings.remove(&conn)?;
        remove_member(&mut inner, binding.room_id, conn);
        tracing::debug!(%conn, room_id = %binding.room_id, "connection unbound");
        Some(binding)
    }

    /// The binding for a connection, if any.
    pub fn binding(&self, conn: ConnectionId) -> Option<Binding> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.bindings.get(&conn).cloned()
    }

    /// Connections currently bound to a room, with their sessions.
    pub fn members_of(
        &self,
        room_id: RoomId,
    ) -> Vec<(ConnectionId, SessionId)> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .rooms
            .get(&room_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(conn, m)| (*conn, m.session_id.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of connections bound to a room.
    pub fn room_len(&self, room_id: RoomId) -> usize {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.rooms.get(&room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Delivers a frame to every connection in a room, best-effort.
    /// A connection whose writer is gone is skipped; delivery to the rest
    /// proceeds. Returns the number of connections reached.
    pub fn send_to_room(&self, room_id: RoomId, frame: &str) -> usize {
        let inner = self.inner.read().expect("registry lock poisoned");
        let Some(members) = inner.rooms.get(&room_id) else {
            return 0;
        };
        let mut delivered = 0;
        for member in members.values() {
            if member.outbound.send(frame.to_owned()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Delivers a frame to a single bound connection, best-effort.
    pub fn send_to(&self, conn: ConnectionId, frame: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        let Some(binding) = inner.bindings.get(&conn) else {
            return false;
        };
        inner
            .rooms
            .get(&binding.room_id)
            .and_then(|members| members.get(&conn))
            .map(|m| m.outbound.send(frame.to_owned()).is_ok())
            .unwrap_or(false)
    }
}

fn remove_member(inner: &mut Inner, room_id: RoomId, conn: ConnectionId) {
    if let Some(members) = inner.rooms.get_mut(&room_id) {
        members.remove(&conn);
        if members.is_empty() {
            inner.rooms.remove(&room_id);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
