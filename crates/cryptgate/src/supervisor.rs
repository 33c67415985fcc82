//! The room supervisor: one owned simulation task per active room.
//!
//! This is the only place simulation loops start and stop. Each loop is a
//! Tokio task that exclusively owns its room's [`GameState`], selects over
//! a command channel and a fixed-rate tick timer, and broadcasts exactly
//! one snapshot per tick through the session registry. The loop owns its
//! own lifetime: it exits when the game leaves `Playing` or when a
//! shutdown command arrives, never by external abort — so a broadcast can
//! never race a teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cryptgate_protocol::{GameStatus, RoomId, RoomStatus, ServerMessage, SessionId};
use cryptgate_registry::Registry;
use cryptgate_sim::{advance, GameState, InputBuffer, InputFrame, SimConfig};
use cryptgate_store::RoomStore;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Commands a running simulation accepts from connection handlers and
/// the lobby. All fire-and-forget: the tick loop applies them at its own
/// cadence.
#[derive(Debug)]
pub enum SimCommand {
    /// Queue a player's intent for the next tick.
    Input {
        session_id: SessionId,
        frame: InputFrame,
    },
    /// A participant's connection went away mid-round: drop them to zero
    /// health in place. Their entry stays for outcome accounting.
    MarkDisconnected { session_id: SessionId },
    /// Ask the loop to wind down (e.g., the room emptied out).
    Shutdown,
}

/// Cheap cloneable handle to a running simulation task.
#[derive(Clone)]
pub struct SimHandle {
    room_id: RoomId,
    tx: mpsc::UnboundedSender<SimCommand>,
}

impl SimHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Queues an input frame. Dropped silently if the loop already ended.
    pub fn input(&self, session_id: SessionId, frame: InputFrame) {
        let _ = self.tx.send(SimCommand::Input { session_id, frame });
    }

    /// Marks a disconnected participant dead in the simulation.
    pub fn mark_disconnected(&self, session_id: SessionId) {
        let _ = self.tx.send(SimCommand::MarkDisconnected { session_id });
    }

    /// Requests shutdown. The loop exits on its next tick.
    pub fn shutdown(&self) {
        let _ = self.tx.send(SimCommand::Shutdown);
    }
}

/// The shared handle map. Each exiting task removes its own entry, so
/// a handle never outlives the loop it points at.
type HandleMap = Arc<Mutex<HashMap<RoomId, SimHandle>>>;

/// Tracks every live simulation task and is the sole starter/stopper.
pub struct RoomSupervisor<S: RoomStore> {
    store: Arc<S>,
    registry: Arc<Registry>,
    config: SimConfig,
    rooms: HandleMap,
}

impl<S: RoomStore> RoomSupervisor<S> {
    pub fn new(
        store: Arc<S>,
        registry: Arc<Registry>,
        config: SimConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            rooms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawns the simulation task for a room and registers its handle.
    /// The state passed in becomes the task's exclusively owned world.
    pub fn start(&self, room_id: RoomId, state: GameState) -> SimHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SimHandle { room_id, tx };
        self.rooms
            .lock()
            .expect("supervisor lock poisoned")
            .insert(room_id, handle.clone());

        let task = RoomTask {
            room_id,
            state,
            rx,
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            rooms: Arc::clone(&self.rooms),
        };
        tokio::spawn(task.run());

        tracing::info!(%room_id, "simulation started");
        handle
    }

    /// Asks a room's loop to wind down. No-op if it isn't running.
    pub fn stop(&self, room_id: RoomId) {
        if let Some(handle) = self.handle(room_id) {
            handle.shutdown();
        }
    }

    /// The handle for a room's running simulation, if any.
    pub fn handle(&self, room_id: RoomId) -> Option<SimHandle> {
        self.rooms
            .lock()
            .expect("supervisor lock poisoned")
            .get(&room_id)
            .cloned()
    }

    pub fn is_running(&self, room_id: RoomId) -> bool {
        self.rooms
            .lock()
            .expect("supervisor lock poisoned")
            .contains_key(&room_id)
    }
}

// ---------------------------------------------------------------------------
// The per-room tick task
// ---------------------------------------------------------------------------

struct RoomTask<S: RoomStore> {
    room_id: RoomId,
    state: GameState,
    rx: mpsc::UnboundedReceiver<SimCommand>,
    registry: Arc<Registry>,
    store: Arc<S>,
    config: SimConfig,
    rooms: HandleMap,
}

impl<S: RoomStore> RoomTask<S> {
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.tick_duration());
        // A slow tick must not cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let started = Instant::now();
        let mut inputs = InputBuffer::new();
        let mut closing = false;

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(SimCommand::Input { session_id, frame }) => {
                        inputs.push(session_id, frame);
                    }
                    Some(SimCommand::MarkDisconnected { session_id }) => {
                        tracing::info!(
                            room_id = %self.room_id,
                            %session_id,
                            "participant disconnected mid-round"
                        );
                        self.state.mark_dead(&session_id);
                    }
                    Some(SimCommand::Shutdown) => {
                        closing = true;
                    }
                    // All senders gone: nothing further can arrive.
                    None => break,
                },
                _ = interval.tick() => {
                    if closing {
                        break;
                    }
                    let now_ms = started.elapsed().as_millis() as u64;
                    let frames = inputs.drain();
                    advance(&mut self.state, &frames, now_ms, &self.config);

                    // Exactly one snapshot per tick, changed or not.
                    let snapshot = self.state.snapshot(now_ms);
                    match cryptgate_protocol::encode(&ServerMessage::GameState(snapshot)) {
                        Ok(frame) => {
                            self.registry.send_to_room(self.room_id, &frame);
                        }
                        Err(e) => {
                            tracing::error!(
                                room_id = %self.room_id,
                                error = %e,
                                "snapshot encode failed"
                            );
                        }
                    }

                    if self.state.status != GameStatus::Playing {
                        tracing::info!(
                            room_id = %self.room_id,
                            status = ?self.state.status,
                            tick_ms = now_ms,
                            "round over"
                        );
                        break;
                    }
                }
            }
        }

        if let Err(e) = self
            .store
            .update_room_status(self.room_id, RoomStatus::Finished)
            .await
        {
            tracing::warn!(
                room_id = %self.room_id,
                error = %e,
                "failed to mark room finished"
            );
        }
        self.rooms
            .lock()
            .expect("supervisor lock poisoned")
            .remove(&self.room_id);
        tracing::info!(room_id = %self.room_id, "simulation stopped");
    }
}
