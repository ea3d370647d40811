//! Per-connection handler: socket setup, action routing, seat cleanup.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. WebSocket upgrade → assign a `ConnectionId`
//!   2. Split the socket; a writer task drains this connection's event queue
//!   3. Send `Connected` → the client may act
//!   4. Loop: decode actions → route to the lobby registry
//!
//! Lobby actors never touch the socket. They push [`ServerEvent`]s into
//! the connection's queue and the writer task here owns the sink, so a
//! slow client stalls only its own writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use triviarena_game::{EventSender, GameAction, GameError, RankingStore};
use triviarena_protocol::{ClientAction, Codec, ConnectionId, ServerEvent};
use triviarena_questions::QuestionSource;

use crate::server::ServerState;
use crate::ServerError;

/// Connection ids are process-wide and never reused.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Drop guard that vacates a connection's seat when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SeatGuard<S: QuestionSource, R: RankingStore, C: Codec> {
    conn: ConnectionId,
    state: Arc<ServerState<S, R, C>>,
}

impl<S: QuestionSource, R: RankingStore, C: Codec> Drop for SeatGuard<S, R, C> {
    fn drop(&mut self) {
        let conn = self.conn;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry.lock().await.disconnect(conn).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, R, C>(
    stream: TcpStream,
    state: Arc<ServerState<S, R, C>>,
) -> Result<(), ServerError>
where
    S: QuestionSource,
    R: RankingStore,
    C: Codec,
{
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let conn = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%conn, "handling new connection");

    let (mut sink, mut frames) = ws.split();
    let (events, mut outbox) = mpsc::unbounded_channel::<ServerEvent>();

    // The writer half. Seated or not, everything this connection is told
    // goes through `events`; the task ends once every sender is gone.
    let writer_state = Arc::clone(&state);
    tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let bytes = match writer_state.codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Greet first: the client needs its id before anything else makes sense.
    let _ = events.send(ServerEvent::Connected { connection_id: conn });

    let _guard = SeatGuard {
        conn,
        state: Arc::clone(&state),
    };

    while let Some(frame) = frames.next().await {
        let data: Vec<u8> = match frame {
            Ok(Message::Binary(data)) => data.into(),
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Close(_)) => {
                tracing::debug!(%conn, "close frame received");
                break;
            }
            // Ping/pong and fragments are handled by tungstenite.
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "recv error");
                break;
            }
        };

        let action: ClientAction = match state.codec.decode(&data) {
            Ok(action) => action,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "failed to decode action");
                let _ = events.send(ServerEvent::Error {
                    message: format!("unreadable action: {e}"),
                });
                continue;
            }
        };

        if let Err(e) = route_action(conn, action, &state, &events).await {
            let _ = events.send(ServerEvent::Error {
                message: e.to_string(),
            });
        }
    }

    tracing::debug!(%conn, "connection finished");

    // _guard drops here → the seat is vacated.
    Ok(())
}

/// Routes one decoded action.
///
/// Lobby membership actions go to the registry directly. Gameplay actions
/// are forwarded into the player's lobby actor, which reports rule
/// violations (wrong phase, bad answer, power misuse) to the player
/// itself; the errors surfacing here are routing failures, such as acting
/// without a seat.
async fn route_action<S, R, C>(
    conn: ConnectionId,
    action: ClientAction,
    state: &Arc<ServerState<S, R, C>>,
    events: &EventSender,
) -> Result<(), GameError>
where
    S: QuestionSource,
    R: RankingStore,
    C: Codec,
{
    let game_action = match action {
        ClientAction::CreateLobby {
            player_name,
            account,
            max_players,
        } => {
            // The new lobby actor sends the creator their LobbyCreated frame.
            return state
                .registry
                .lock()
                .await
                .create_lobby(conn, player_name, account, max_players, events.clone())
                .map(|_| ());
        }
        ClientAction::JoinLobby {
            lobby_id,
            player_name,
            account,
        } => {
            return state
                .registry
                .lock()
                .await
                .join_lobby(conn, lobby_id, player_name, account, events.clone())
                .await;
        }
        ClientAction::LeaveLobby => {
            return state.registry.lock().await.leave_lobby(conn).await;
        }
        ClientAction::ListLobbies => {
            let lobbies = state.registry.lock().await.list_lobbies().await;
            let _ = events.send(ServerEvent::LobbyList { lobbies });
            return Ok(());
        }

        ClientAction::ToggleReady => GameAction::ToggleReady,
        ClientAction::StartGame => GameAction::StartGame,
        ClientAction::SubmitAnswer { answer_index } => GameAction::SubmitAnswer { answer_index },
        ClientAction::TimeUp => GameAction::TimeUp,
        ClientAction::UsePower { power_type } => GameAction::UsePower { power_type },
        ClientAction::RequestNewRound => GameAction::RequestNewRound,
        ClientAction::ReadyForNewRound => GameAction::ReadyForNewRound,
        ClientAction::BackToLobby => GameAction::BackToLobby,
        ClientAction::ChatMessage { message } => GameAction::Chat { message },
    };

    state.registry.lock().await.dispatch(conn, game_action).await
}
