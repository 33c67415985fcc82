//! Integration tests for the lobby state machine, wired to the real
//! registry, supervisor, and in-memory store — no sockets involved.
//! Outbound frames are observed on each connection's channel directly.

use std::sync::Arc;
use std::time::Duration;

use cryptgate::{LobbyError, LobbyService, RoomSupervisor};
use cryptgate_protocol::{
    GameSnapshot, Phase, Player, Role, Room, RoomStatus, ServerMessage,
};
use cryptgate_registry::{ConnectionId, Registry};
use cryptgate_sim::SimConfig;
use cryptgate_store::{MemoryStore, RoomStore};
use tokio::sync::mpsc;

struct Harness {
    store: Arc<MemoryStore>,
    registry: Arc<Registry>,
    supervisor: Arc<RoomSupervisor<MemoryStore>>,
    lobby: LobbyService<MemoryStore>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(Registry::new());
    let config = SimConfig::default();
    let supervisor = Arc::new(RoomSupervisor::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        config.clone(),
    ));
    let lobby = LobbyService::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&supervisor),
        config,
    );
    Harness {
        store,
        registry,
        supervisor,
        lobby,
    }
}

type Frames = mpsc::UnboundedReceiver<String>;

async fn join(
    h: &Harness,
    conn: u64,
    code: &str,
    name: &str,
) -> Result<(Room, Player, Frames), LobbyError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let (room, player) = h
        .lobby
        .join(ConnectionId(conn), tx, code, name, None)
        .await?;
    Ok((room, player, rx))
}

/// Waits for the next `game_state` frame on a connection's channel.
async fn next_game_state(rx: &mut Frames) -> GameSnapshot {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for game_state")
            .expect("channel closed");
        if let Ok(ServerMessage::GameState(snap)) =
            serde_json::from_str::<ServerMessage>(&frame)
        {
            return snap;
        }
    }
}

/// Most recent `room_update` among the frames already queued.
fn last_room_update(rx: &mut Frames) -> Option<(Vec<Player>, Room)> {
    let mut latest = None;
    while let Ok(frame) = rx.try_recv() {
        if let Ok(ServerMessage::RoomUpdate { players, room }) =
            serde_json::from_str::<ServerMessage>(&frame)
        {
            latest = Some((players, room));
        }
    }
    latest
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test]
async fn test_first_joiner_is_host_without_role() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();

    let (_, player, mut rx) = join(&h, 1, &room.code, "ana").await.unwrap();

    assert!(player.is_host);
    assert_eq!(player.role, None);
    assert!(!player.is_ready);

    let (players, _) = last_room_update(&mut rx).unwrap();
    assert_eq!(players.len(), 1);
}

#[tokio::test]
async fn test_second_joiner_is_not_host() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();

    let (_, bo, _rx) = join(&h, 2, &room.code, "bo").await.unwrap();
    assert!(!bo.is_host);
}

#[tokio::test]
async fn test_join_unknown_code_rejected() {
    let h = harness();
    let result = join(&h, 1, "NOPE", "ana").await;
    assert!(matches!(result, Err(LobbyError::RoomNotFound)));
}

#[tokio::test]
async fn test_sixth_player_is_rejected() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    for i in 0..5 {
        join(&h, i + 1, &room.code, &format!("p{i}")).await.unwrap();
    }

    let result = join(&h, 6, &room.code, "late").await;
    assert!(matches!(result, Err(LobbyError::RoomFull)));
    assert_eq!(
        h.store.get_players_in_room(room.id).await.unwrap().len(),
        5
    );
}

#[tokio::test]
async fn test_rejoin_by_session_id_does_not_duplicate() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx) = join(&h, 1, &room.code, "ana").await.unwrap();

    // Same person, new socket, token presented.
    let (tx, _rx2) = mpsc::unbounded_channel();
    let (_, again) = h
        .lobby
        .join(
            ConnectionId(2),
            tx,
            &room.code,
            "ana",
            Some(&ana.session_id),
        )
        .await
        .unwrap();

    assert_eq!(again.id, ana.id);
    assert_eq!(
        h.store.get_players_in_room(room.id).await.unwrap().len(),
        1
    );
    // The new connection owns the binding now.
    assert_eq!(
        h.registry.binding(ConnectionId(2)).unwrap().session_id,
        ana.session_id
    );
}

#[tokio::test]
async fn test_rejoin_by_name_reuses_player() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx) = join(&h, 1, &room.code, "ana").await.unwrap();

    let (_, again, _rx2) = join(&h, 2, &room.code, "ana").await.unwrap();

    assert_eq!(again.id, ana.id);
    assert_eq!(
        h.store.get_players_in_room(room.id).await.unwrap().len(),
        1
    );
}

// =========================================================================
// Role selection
// =========================================================================

#[tokio::test]
async fn test_duplicate_role_rejected_first_selection_stands() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx1) = join(&h, 1, &room.code, "ana").await.unwrap();
    join(&h, 2, &room.code, "bo").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Archer)
        .await
        .unwrap();
    let result = h.lobby.select_role(ConnectionId(2), Role::Archer).await;

    assert!(matches!(result, Err(LobbyError::RoleTaken)));
    // First player's selection is unaffected.
    let ana_now = h.store.get_player(ana.id).await.unwrap().unwrap();
    assert_eq!(ana_now.role, Some(Role::Archer));
}

#[tokio::test]
async fn test_reselecting_own_role_is_noop_success() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Mage)
        .await
        .unwrap();
    h.lobby
        .select_role(ConnectionId(1), Role::Mage)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_role_change_rejected_while_ready() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();
    join(&h, 2, &room.code, "bo").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Beast)
        .await
        .unwrap();
    h.lobby.set_ready(ConnectionId(1), true).await.unwrap();

    let result = h.lobby.select_role(ConnectionId(1), Role::Healer).await;
    assert!(matches!(result, Err(LobbyError::RoleLockedWhileReady)));
}

#[tokio::test]
async fn test_ready_without_role_rejected() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();

    let result = h.lobby.set_ready(ConnectionId(1), true).await;
    assert!(matches!(result, Err(LobbyError::NoRoleSelected)));
}

#[tokio::test]
async fn test_unjoined_connection_cannot_act() {
    let h = harness();
    let result = h.lobby.select_role(ConnectionId(9), Role::Mage).await;
    assert!(matches!(result, Err(LobbyError::NotInRoom)));
}

// =========================================================================
// Starting
// =========================================================================

#[tokio::test]
async fn test_solo_healer_ready_auto_starts() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, _, mut rx) = join(&h, 1, &room.code, "ana").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Healer)
        .await
        .unwrap();
    h.lobby.set_ready(ConnectionId(1), true).await.unwrap();

    // Room record flipped and the loop is live.
    let room_now = h.store.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(room_now.status, RoomStatus::Playing);
    assert!(h.supervisor.is_running(room.id));

    // First snapshot: courtyard, wave 0, one living healer.
    let snap = next_game_state(&mut rx).await;
    assert_eq!(snap.phase, Phase::Courtyard);
    assert_eq!(snap.wave, 0);
    assert_eq!(snap.players.len(), 1);
    assert_eq!(snap.players[0].role, Role::Healer);
    assert!(!snap.players[0].is_dead);
}

#[tokio::test]
async fn test_auto_start_waits_for_everyone() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();
    join(&h, 2, &room.code, "bo").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Swordsman)
        .await
        .unwrap();
    h.lobby
        .select_role(ConnectionId(2), Role::Healer)
        .await
        .unwrap();
    h.lobby.set_ready(ConnectionId(1), true).await.unwrap();

    // Only one of two is ready: still waiting.
    let room_now = h.store.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(room_now.status, RoomStatus::Waiting);
    assert!(!h.supervisor.is_running(room.id));

    h.lobby.set_ready(ConnectionId(2), true).await.unwrap();
    let room_now = h.store.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(room_now.status, RoomStatus::Playing);
}

#[tokio::test]
async fn test_manual_start_requires_host() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();
    join(&h, 2, &room.code, "bo").await.unwrap();

    let result = h.lobby.start_game(ConnectionId(2)).await;
    assert!(matches!(result, Err(LobbyError::NotHost)));
}

#[tokio::test]
async fn test_manual_start_reports_unmet_condition() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();
    join(&h, 2, &room.code, "bo").await.unwrap();

    let result = h.lobby.start_game(ConnectionId(1)).await;
    match result {
        Err(LobbyError::NotStartable(reason)) => {
            assert!(reason.contains("ready"));
        }
        other => panic!("expected NotStartable, got {other:?}"),
    }
    assert!(!h.supervisor.is_running(room.id));
}

#[tokio::test]
async fn test_join_after_start_rejected_for_new_player() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();
    h.lobby
        .select_role(ConnectionId(1), Role::Beast)
        .await
        .unwrap();
    h.lobby.set_ready(ConnectionId(1), true).await.unwrap();

    let result = join(&h, 2, &room.code, "late").await;
    assert!(matches!(result, Err(LobbyError::GameInProgress)));
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_host_disconnect_promotes_earliest_joiner() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx1) = join(&h, 1, &room.code, "ana").await.unwrap();
    let (_, bo, mut rx2) = join(&h, 2, &room.code, "bo").await.unwrap();
    join(&h, 3, &room.code, "cy").await.unwrap();
    assert!(ana.is_host);

    h.lobby.disconnect(ConnectionId(1)).await.unwrap();

    let players = h.store.get_players_in_room(room.id).await.unwrap();
    assert_eq!(players.len(), 2);
    let new_host = players.iter().find(|p| p.is_host).unwrap();
    assert_eq!(new_host.id, bo.id, "earliest remaining joiner");

    // The survivors heard about it.
    let (roster, _) = last_room_update(&mut rx2).unwrap();
    assert!(roster.iter().any(|p| p.is_host && p.id == bo.id));
}

#[tokio::test]
async fn test_last_disconnect_finishes_room() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();

    h.lobby.disconnect(ConnectionId(1)).await.unwrap();

    let room_now = h.store.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(room_now.status, RoomStatus::Finished);
    assert!(h
        .store
        .get_players_in_room(room.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_stale_socket_close_after_reconnect_keeps_player() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx1) = join(&h, 1, &room.code, "ana").await.unwrap();

    // Reconnect on a fresh socket, then the old one finally closes.
    let (tx, _rx2) = mpsc::unbounded_channel();
    h.lobby
        .join(
            ConnectionId(2),
            tx,
            &room.code,
            "ana",
            Some(&ana.session_id),
        )
        .await
        .unwrap();
    h.lobby.disconnect(ConnectionId(1)).await.unwrap();

    // The player survives; only the stale binding went away.
    assert_eq!(
        h.store.get_players_in_room(room.id).await.unwrap().len(),
        1
    );
    assert!(h.registry.binding(ConnectionId(2)).is_some());
    assert!(h.registry.binding(ConnectionId(1)).is_none());
}

#[tokio::test]
async fn test_disconnect_before_join_is_harmless() {
    let h = harness();
    h.lobby.disconnect(ConnectionId(42)).await.unwrap();
}

#[tokio::test]
async fn test_midgame_disconnect_marks_dead_but_keeps_entry() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx1) = join(&h, 1, &room.code, "ana").await.unwrap();
    let (_, _, mut rx2) = join(&h, 2, &room.code, "bo").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Swordsman)
        .await
        .unwrap();
    h.lobby
        .select_role(ConnectionId(2), Role::Healer)
        .await
        .unwrap();
    h.lobby.set_ready(ConnectionId(1), true).await.unwrap();
    h.lobby.set_ready(ConnectionId(2), true).await.unwrap();
    assert!(h.supervisor.is_running(room.id));

    h.lobby.disconnect(ConnectionId(1)).await.unwrap();

    // The surviving connection keeps receiving snapshots, and ana is in
    // them — dead, never removed.
    let snap = loop {
        let snap = next_game_state(&mut rx2).await;
        let ana_state = snap
            .players
            .iter()
            .find(|p| p.session_id == ana.session_id)
            .expect("disconnected player must stay in the snapshot");
        if ana_state.is_dead {
            break snap;
        }
    };
    assert_eq!(snap.players.len(), 2);

    // The roster record survives the round too.
    assert_eq!(
        h.store.get_players_in_room(room.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_all_connections_gone_stops_loop_and_finishes_room() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    join(&h, 1, &room.code, "ana").await.unwrap();

    h.lobby
        .select_role(ConnectionId(1), Role::Mage)
        .await
        .unwrap();
    h.lobby.set_ready(ConnectionId(1), true).await.unwrap();
    assert!(h.supervisor.is_running(room.id));

    h.lobby.disconnect(ConnectionId(1)).await.unwrap();

    // The loop winds down through its own tick check.
    let mut stopped = false;
    for _ in 0..50 {
        if !h.supervisor.is_running(room.id) {
            stopped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(stopped, "loop must stop once the room empties");
    assert_eq!(
        h.store.get_room(room.id).await.unwrap().unwrap().status,
        RoomStatus::Finished
    );
}

// =========================================================================
// Session identifiers
// =========================================================================

#[tokio::test]
async fn test_issued_session_ids_are_distinct_tokens() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _r1) = join(&h, 1, &room.code, "ana").await.unwrap();
    let (_, bo, _r2) = join(&h, 2, &room.code, "bo").await.unwrap();

    assert_ne!(ana.session_id, bo.session_id);
    assert_eq!(ana.session_id.0.len(), 32);
}

#[tokio::test]
async fn test_binding_survives_roster_lookup() {
    let h = harness();
    let room = h.store.create_room().await.unwrap();
    let (_, ana, _rx) = join(&h, 1, &room.code, "ana").await.unwrap();

    let binding = h.registry.binding(ConnectionId(1)).unwrap();
    assert_eq!(binding.room_id, room.id);
    assert_eq!(binding.session_id, ana.session_id);
}
