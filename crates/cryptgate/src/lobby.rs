//! The lobby state machine: join, roles, ready-up, game start.
//!
//! Every operation runs the same shape: resolve the caller's binding,
//! check the guards in order, mutate the repository, then broadcast the
//! fresh roster to the room. Rejections are typed errors that the
//! connection handler turns into `error` frames for the requester only —
//! they are never broadcast and never fatal.

use std::sync::Arc;

use cryptgate_protocol::{
    Player, ProtocolError, Role, Room, RoomId, RoomStatus, ServerMessage,
    SessionId,
};
use cryptgate_registry::{ConnectionId, Outbound, Registry};
use cryptgate_sim::{GameState, RosterEntry, SimConfig};
use cryptgate_store::{new_session_id, NewPlayer, RoomStore, StoreError};

use crate::supervisor::RoomSupervisor;

/// Hard cap on distinct players per room.
pub const MAX_PLAYERS: usize = 5;

/// Rejections and faults from lobby operations. The `Display` strings of
/// the guard variants go to the client verbatim.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("room not found")]
    RoomNotFound,

    #[error("room is full")]
    RoomFull,

    #[error("game already in progress")]
    GameInProgress,

    #[error("role taken")]
    RoleTaken,

    #[error("cannot change role while ready")]
    RoleLockedWhileReady,

    #[error("choose a role first")]
    NoRoleSelected,

    #[error("only the host can start the game")]
    NotHost,

    #[error("cannot start: {0}")]
    NotStartable(String),

    #[error("join a room first")]
    NotInRoom,

    /// Repository fault — internal, not a client mistake.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Framing fault while broadcasting — internal.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Pre-game orchestration for every room.
///
/// Holds the repository, the session registry, and the supervisor; cheap
/// to share because everything inside is an `Arc`.
pub struct LobbyService<S: RoomStore> {
    store: Arc<S>,
    registry: Arc<Registry>,
    supervisor: Arc<RoomSupervisor<S>>,
    config: SimConfig,
}

impl<S: RoomStore> LobbyService<S> {
    pub fn new(
        store: Arc<S>,
        registry: Arc<Registry>,
        supervisor: Arc<RoomSupervisor<S>>,
        config: SimConfig,
    ) -> Self {
        Self {
            store,
            registry,
            supervisor,
            config,
        }
    }

    // -----------------------------------------------------------------
    // Join
    // -----------------------------------------------------------------

    /// Joins (or re-joins) a room by code and binds the connection.
    ///
    /// Resolution order: a known session id re-binds its player; a known
    /// name in the room re-binds that player's session; otherwise a new
    /// player is created — which requires the room to still be waiting
    /// and under the player cap. The first-ever joiner becomes host.
    ///
    /// The joining socket gets its `joined` identity frame first, then
    /// the whole room (it included) gets the roster broadcast.
    pub async fn join(
        &self,
        conn: ConnectionId,
        outbound: Outbound,
        code: &str,
        name: &str,
        session_id: Option<&SessionId>,
    ) -> Result<(Room, Player), LobbyError> {
        let room = self
            .store
            .get_room_by_code(code)
            .await?
            .ok_or(LobbyError::RoomNotFound)?;
        let players = self.store.get_players_in_room(room.id).await?;

        let existing = session_id
            .and_then(|sid| players.iter().find(|p| &p.session_id == sid))
            .or_else(|| players.iter().find(|p| p.name == name));

        let player = match existing {
            Some(player) => {
                tracing::info!(
                    room_id = %room.id,
                    player_id = %player.id,
                    "player re-joined"
                );
                player.clone()
            }
            None => {
                if room.status != RoomStatus::Waiting {
                    return Err(LobbyError::GameInProgress);
                }
                if players.len() >= MAX_PLAYERS {
                    return Err(LobbyError::RoomFull);
                }
                let player = self
                    .store
                    .add_player(NewPlayer {
                        room_id: room.id,
                        session_id: new_session_id(),
                        name: name.to_string(),
                        role: None,
                        is_host: players.is_empty(),
                        is_ready: false,
                    })
                    .await?;
                tracing::info!(
                    room_id = %room.id,
                    player_id = %player.id,
                    host = player.is_host,
                    "player joined"
                );
                player
            }
        };

        self.registry
            .bind(conn, room.id, player.session_id.clone(), outbound);

        let identity = cryptgate_protocol::encode(&ServerMessage::Joined {
            room_id: room.id,
            session_id: player.session_id.clone(),
            player_id: player.id,
        })?;
        self.registry.send_to(conn, &identity);
        self.broadcast_roster(room.id).await?;
        Ok((room, player))
    }

    // -----------------------------------------------------------------
    // Role selection
    // -----------------------------------------------------------------

    /// Picks a role. Rejected while ready, and rejected when another
    /// player in the room already holds it. Re-selecting one's own role
    /// is a no-op success.
    pub async fn select_role(
        &self,
        conn: ConnectionId,
        role: Role,
    ) -> Result<(), LobbyError> {
        let (room_id, player) = self.caller(conn).await?;
        if player.is_ready {
            return Err(LobbyError::RoleLockedWhileReady);
        }

        let players = self.store.get_players_in_room(room_id).await?;
        let taken_by_other = players
            .iter()
            .any(|p| p.id != player.id && p.role == Some(role));
        if taken_by_other {
            return Err(LobbyError::RoleTaken);
        }

        if player.role != Some(role) {
            self.store.update_player_role(player.id, role).await?;
        }
        self.broadcast_roster(room_id).await
    }

    // -----------------------------------------------------------------
    // Ready-up and start
    // -----------------------------------------------------------------

    /// Toggles the ready flag. Readying up requires a role; every toggle
    /// re-evaluates the auto-start condition.
    pub async fn set_ready(
        &self,
        conn: ConnectionId,
        is_ready: bool,
    ) -> Result<(), LobbyError> {
        let (room_id, player) = self.caller(conn).await?;
        if is_ready && player.role.is_none() {
            return Err(LobbyError::NoRoleSelected);
        }

        self.store.update_player_ready(player.id, is_ready).await?;
        self.broadcast_roster(room_id).await?;

        // Auto-start: everyone ready, everyone roled, roles distinct.
        if is_ready {
            let room = self
                .store
                .get_room(room_id)
                .await?
                .ok_or(LobbyError::RoomNotFound)?;
            if room.status == RoomStatus::Waiting {
                let players = self.store.get_players_in_room(room_id).await?;
                if let Ok(roster) = build_roster(&players) {
                    self.begin_game(room_id, roster).await?;
                }
            }
        }
        Ok(())
    }

    /// Host-only manual start. Identical effect to auto-start, but
    /// reports why the room cannot start instead of waiting silently.
    pub async fn start_game(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        let (room_id, player) = self.caller(conn).await?;
        if !player.is_host {
            return Err(LobbyError::NotHost);
        }
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or(LobbyError::RoomNotFound)?;
        if room.status != RoomStatus::Waiting {
            return Err(LobbyError::GameInProgress);
        }

        let players = self.store.get_players_in_room(room_id).await?;
        let roster = build_roster(&players).map_err(LobbyError::NotStartable)?;
        self.begin_game(room_id, roster).await
    }

    /// Flips the room to playing, builds the starting world, and hands
    /// it to the supervisor. The first snapshot goes out on the loop's
    /// first tick.
    async fn begin_game(
        &self,
        room_id: RoomId,
        roster: Vec<RosterEntry>,
    ) -> Result<(), LobbyError> {
        self.store
            .update_room_status(room_id, RoomStatus::Playing)
            .await?;
        let state = GameState::new(&self.config, &roster);
        self.supervisor.start(room_id, state);
        tracing::info!(%room_id, players = roster.len(), "game started");
        self.broadcast_roster(room_id).await
    }

    // -----------------------------------------------------------------
    // Disconnect
    // -----------------------------------------------------------------

    /// Handles a connection going away, in whatever lobby state the room
    /// is in. Never an error to the caller — the socket is already gone.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        let Some(binding) = self.registry.unbind(conn) else {
            return Ok(()); // never joined a room
        };
        let room_id = binding.room_id;
        let Some(room) = self.store.get_room(room_id).await? else {
            return Ok(());
        };

        // A reconnect replaces the socket but not the player: if another
        // live connection still owns this session, the closing one was
        // stale and there is nothing to clean up.
        let superseded = self
            .registry
            .members_of(room_id)
            .iter()
            .any(|(_, sid)| sid == &binding.session_id);
        if superseded {
            return Ok(());
        }

        match room.status {
            RoomStatus::Waiting => {
                let leaver = self
                    .store
                    .get_player_by_session_id(&binding.session_id)
                    .await?;
                self.store.remove_player(&binding.session_id).await?;

                let remaining = self.store.get_players_in_room(room_id).await?;
                if remaining.is_empty() {
                    self.store
                        .update_room_status(room_id, RoomStatus::Finished)
                        .await?;
                    tracing::info!(%room_id, "room emptied, finished");
                    return Ok(());
                }

                // The earliest remaining joiner inherits the host flag,
                // so the room can always still be started manually.
                if leaver.map(|p| p.is_host).unwrap_or(false) {
                    if let Some(successor) = remaining.first() {
                        self.store
                            .update_player_host(successor.id, true)
                            .await?;
                        tracing::info!(
                            %room_id,
                            new_host = %successor.id,
                            "host left, promoted earliest joiner"
                        );
                    }
                }
                self.broadcast_roster(room_id).await
            }
            RoomStatus::Playing => {
                // The participant stays in the simulation at zero health;
                // the roster record stays too, frozen at game start.
                if let Some(handle) = self.supervisor.handle(room_id) {
                    handle.mark_disconnected(binding.session_id.clone());
                }
                if self.registry.members_of(room_id).is_empty() {
                    tracing::info!(%room_id, "last connection gone, stopping loop");
                    self.supervisor.stop(room_id);
                }
                Ok(())
            }
            RoomStatus::Finished => Ok(()),
        }
    }

    // -----------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------

    /// Resolves the calling connection to its room and player record.
    async fn caller(
        &self,
        conn: ConnectionId,
    ) -> Result<(RoomId, Player), LobbyError> {
        let binding = self.registry.binding(conn).ok_or(LobbyError::NotInRoom)?;
        let player = self
            .store
            .get_player_by_session_id(&binding.session_id)
            .await?
            .ok_or(LobbyError::NotInRoom)?;
        Ok((binding.room_id, player))
    }

    /// One roster frame to everyone in the room. Every successful lobby
    /// mutation funnels through here exactly once.
    async fn broadcast_roster(&self, room_id: RoomId) -> Result<(), LobbyError> {
        let Some(room) = self.store.get_room(room_id).await? else {
            return Ok(());
        };
        let players = self.store.get_players_in_room(room_id).await?;
        let frame = cryptgate_protocol::encode(&ServerMessage::RoomUpdate {
            players,
            room,
        })?;
        self.registry.send_to_room(room_id, &frame);
        Ok(())
    }
}

/// Checks the start condition and builds the simulation roster in one
/// pass. `Err` carries the human-readable blocker.
fn build_roster(players: &[Player]) -> Result<Vec<RosterEntry>, String> {
    if players.is_empty() {
        return Err("there are no players in the room".into());
    }
    if players.iter().any(|p| !p.is_ready) {
        return Err("not everyone is ready".into());
    }

    let mut roster = Vec::with_capacity(players.len());
    let mut seen = Vec::with_capacity(players.len());
    for player in players {
        let Some(role) = player.role else {
            return Err(format!("{} has not chosen a role", player.name));
        };
        if seen.contains(&role) {
            return Err(format!("duplicate role: {role}"));
        }
        seen.push(role);
        roster.push(RosterEntry {
            session_id: player.session_id.clone(),
            player_id: player.id,
            name: player.name.clone(),
            role,
        });
    }
    Ok(roster)
}
