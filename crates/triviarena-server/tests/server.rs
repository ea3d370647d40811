//! Integration tests for the server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use triviarena_game::NoopRankingStore;
use triviarena_protocol::{
    ClientAction, ConnectionId, LobbyId, LobbySnapshot, LobbyStatus, ServerEvent,
};
use triviarena_questions::StaticPool;
use triviarena_server::TriviarenaServerBuilder;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = TriviarenaServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(StaticPool::with_default_questions(), NoopRankingStore)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_action(ws: &mut ClientWs, action: &ClientAction) {
    let bytes = serde_json::to_vec(action).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

async fn recv_event(ws: &mut ClientWs) -> ServerEvent {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended")
        .expect("recv");
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

/// Reads the `Connected` greeting every fresh socket receives.
async fn expect_connected(ws: &mut ClientWs) -> ConnectionId {
    match recv_event(ws).await {
        ServerEvent::Connected { connection_id } => connection_id,
        other => panic!("expected Connected, got {other:?}"),
    }
}

async fn create_lobby(ws: &mut ClientWs, name: &str) -> LobbySnapshot {
    send_action(
        ws,
        &ClientAction::CreateLobby {
            player_name: name.to_string(),
            account: None,
            max_players: None,
        },
    )
    .await;
    match recv_event(ws).await {
        ServerEvent::LobbyCreated { lobby } => lobby,
        other => panic!("expected LobbyCreated, got {other:?}"),
    }
}

async fn join_lobby(ws: &mut ClientWs, lobby_id: &LobbyId, name: &str) -> LobbySnapshot {
    send_action(
        ws,
        &ClientAction::JoinLobby {
            lobby_id: lobby_id.clone(),
            player_name: name.to_string(),
            account: None,
        },
    )
    .await;
    match recv_event(ws).await {
        ServerEvent::LobbyJoined { lobby } => lobby,
        other => panic!("expected LobbyJoined, got {other:?}"),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connected_ids_are_distinct() {
    let addr = start_server().await;

    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    let id1 = expect_connected(&mut ws1).await;
    let id2 = expect_connected(&mut ws2).await;
    assert_ne!(id1, id2);
}

#[tokio::test]
async fn test_create_lobby_round_trip() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    let conn = expect_connected(&mut ws).await;

    let lobby = create_lobby(&mut ws, "ana").await;
    assert_eq!(lobby.id.0.len(), 6);
    assert_eq!(lobby.host, conn);
    assert_eq!(lobby.status, LobbyStatus::Waiting);
    assert_eq!(lobby.max_players, 4);
    assert_eq!(lobby.players.len(), 1);
    assert_eq!(lobby.players[0].name, "ana");
    assert!(lobby.players[0].is_host);
}

#[tokio::test]
async fn test_join_reaches_both_connections() {
    let addr = start_server().await;
    let mut ana = connect(&addr).await;
    let mut bo = connect(&addr).await;
    expect_connected(&mut ana).await;
    expect_connected(&mut bo).await;

    let lobby = create_lobby(&mut ana, "ana").await;
    let joined = join_lobby(&mut bo, &lobby.id, "bo").await;
    assert_eq!(joined.players.len(), 2);

    match recv_event(&mut ana).await {
        ServerEvent::PlayerJoined { player_name, lobby } => {
            assert_eq!(player_name, "bo");
            assert_eq!(lobby.players.len(), 2);
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_unknown_lobby_reports_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    expect_connected(&mut ws).await;

    send_action(
        &mut ws,
        &ClientAction::JoinLobby {
            lobby_id: LobbyId::from("ZZZZZZ"),
            player_name: "ana".to_string(),
            account: None,
        },
    )
    .await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { message } => {
            assert_eq!(message, "lobby not found");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_action_without_seat_reports_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    expect_connected(&mut ws).await;

    send_action(&mut ws, &ClientAction::ToggleReady).await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { message } => {
            assert_eq!(message, "you are not in a lobby");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_reports_error_and_skips() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    expect_connected(&mut ws).await;

    // Send garbage data.
    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");

    match recv_event(&mut ws).await {
        ServerEvent::Error { message } => {
            assert!(message.contains("unreadable action"));
        }
        other => panic!("expected Error, got {other:?}"),
    }

    // The connection survives: a valid action still works.
    send_action(&mut ws, &ClientAction::ListLobbies).await;
    match recv_event(&mut ws).await {
        ServerEvent::LobbyList { lobbies } => assert!(lobbies.is_empty()),
        other => panic!("expected LobbyList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_text_frames_accepted() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    expect_connected(&mut ws).await;

    let text = serde_json::to_string(&ClientAction::ListLobbies).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");

    match recv_event(&mut ws).await {
        ServerEvent::LobbyList { lobbies } => assert!(lobbies.is_empty()),
        other => panic!("expected LobbyList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_lobbies_shows_created_lobby() {
    let addr = start_server().await;
    let mut ana = connect(&addr).await;
    expect_connected(&mut ana).await;
    let lobby = create_lobby(&mut ana, "ana").await;

    let mut bo = connect(&addr).await;
    expect_connected(&mut bo).await;
    send_action(&mut bo, &ClientAction::ListLobbies).await;

    match recv_event(&mut bo).await {
        ServerEvent::LobbyList { lobbies } => {
            assert_eq!(lobbies.len(), 1);
            assert_eq!(lobbies[0].id, lobby.id);
            assert_eq!(lobbies[0].host_name, "ana");
            assert_eq!(lobbies[0].player_count, 1);
        }
        other => panic!("expected LobbyList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_game_over_the_wire() {
    let addr = start_server().await;
    let mut ana = connect(&addr).await;
    let mut bo = connect(&addr).await;
    expect_connected(&mut ana).await;
    expect_connected(&mut bo).await;

    let lobby = create_lobby(&mut ana, "ana").await;
    join_lobby(&mut bo, &lobby.id, "bo").await;
    match recv_event(&mut ana).await {
        ServerEvent::PlayerJoined { .. } => {}
        other => panic!("expected PlayerJoined, got {other:?}"),
    }

    send_action(&mut bo, &ClientAction::ToggleReady).await;
    match recv_event(&mut ana).await {
        ServerEvent::LobbyUpdated { .. } => {}
        other => panic!("expected LobbyUpdated, got {other:?}"),
    }
    match recv_event(&mut bo).await {
        ServerEvent::LobbyUpdated { .. } => {}
        other => panic!("expected LobbyUpdated, got {other:?}"),
    }

    send_action(&mut ana, &ClientAction::StartGame).await;
    match recv_event(&mut ana).await {
        ServerEvent::GameStarted { win_score, .. } => assert_eq!(win_score, 10_000),
        other => panic!("expected GameStarted, got {other:?}"),
    }
    match recv_event(&mut bo).await {
        ServerEvent::GameStarted { lobby, .. } => {
            assert_eq!(lobby.status, LobbyStatus::Playing);
        }
        other => panic!("expected GameStarted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_socket_drop_vacates_seat() {
    let addr = start_server().await;
    let mut ana = connect(&addr).await;
    let mut bo = connect(&addr).await;
    expect_connected(&mut ana).await;
    expect_connected(&mut bo).await;

    let lobby = create_lobby(&mut ana, "ana").await;
    join_lobby(&mut bo, &lobby.id, "bo").await;
    match recv_event(&mut ana).await {
        ServerEvent::PlayerJoined { .. } => {}
        other => panic!("expected PlayerJoined, got {other:?}"),
    }

    // No leave, no close frame: the socket just goes away.
    drop(bo);

    match recv_event(&mut ana).await {
        ServerEvent::PlayerLeft { player_name, lobby } => {
            assert_eq!(player_name, "bo");
            assert_eq!(lobby.players.len(), 1);
        }
        other => panic!("expected PlayerLeft, got {other:?}"),
    }
}
