//! Lobby registry: creates, tracks, and routes players to lobby actors.
//!
//! The registry is the entry point for every operation coming off a
//! connection. It owns no game state itself, only the handle table and two
//! reverse indexes enforcing the "one lobby per connection, one seat per
//! account" invariants. The caller (the server's connection layer) wraps it
//! in a lock; methods here take `&mut self` plainly.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;

use triviarena_lobby::{clamp_max_players, Player};
use triviarena_protocol::{AccountId, ConnectionId, LobbyId, LobbySummary};
use triviarena_questions::QuestionSource;

use crate::config::GameConfig;
use crate::error::GameError;
use crate::ranking::RankingStore;
use crate::session::{spawn_lobby, EventSender, GameAction, LobbyHandle};

/// Alphabet for lobby codes. Uppercase plus digits keeps the codes easy to
/// read aloud.
const LOBBY_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const LOBBY_ID_LEN: usize = 6;

fn generate_lobby_id() -> LobbyId {
    let mut rng = rand::rng();
    let code: String = (0..LOBBY_ID_LEN)
        .map(|_| LOBBY_ID_CHARSET[rng.random_range(0..LOBBY_ID_CHARSET.len())] as char)
        .collect();
    LobbyId(code)
}

/// Tracks all live lobbies and which connection sits where.
pub struct LobbyRegistry<S: QuestionSource, R: RankingStore> {
    /// Live lobby actors, keyed by their shareable code.
    lobbies: HashMap<LobbyId, LobbyHandle>,

    /// Maps each connection to the lobby it occupies.
    /// A connection sits in at most ONE lobby at a time.
    by_conn: HashMap<ConnectionId, LobbyId>,

    /// Maps each authenticated account to the lobby it occupies, so the
    /// same identity cannot hold seats in two lobbies from two devices.
    by_account: HashMap<AccountId, LobbyId>,

    config: GameConfig,
    source: Arc<S>,
    ranking: Arc<R>,
}

impl<S: QuestionSource, R: RankingStore> LobbyRegistry<S, R> {
    pub fn new(config: GameConfig, source: Arc<S>, ranking: Arc<R>) -> Self {
        Self {
            lobbies: HashMap::new(),
            by_conn: HashMap::new(),
            by_account: HashMap::new(),
            config,
            source,
            ranking,
        }
    }

    /// Creates a lobby with `conn` as its host and returns the new code.
    ///
    /// The spawned actor sends the creator their `LobbyCreated` frame.
    pub fn create_lobby(
        &mut self,
        conn: ConnectionId,
        name: String,
        account: Option<AccountId>,
        max_players: Option<usize>,
        sender: EventSender,
    ) -> Result<LobbyId, GameError> {
        self.ensure_unseated(conn, account.as_ref())?;

        let lobby_id = loop {
            let candidate = generate_lobby_id();
            if !self.lobbies.contains_key(&candidate) {
                break candidate;
            }
        };

        let founder = Player::host(conn, name, account.clone());
        let handle = spawn_lobby(
            lobby_id.clone(),
            founder,
            sender,
            clamp_max_players(max_players),
            self.config,
            Arc::clone(&self.source),
            Arc::clone(&self.ranking),
        );
        self.lobbies.insert(lobby_id.clone(), handle);
        self.by_conn.insert(conn, lobby_id.clone());
        if let Some(account) = account {
            self.by_account.insert(account, lobby_id.clone());
        }

        tracing::info!(%lobby_id, %conn, "lobby created");
        Ok(lobby_id)
    }

    /// Seats `conn` in an existing lobby.
    pub async fn join_lobby(
        &mut self,
        conn: ConnectionId,
        lobby_id: LobbyId,
        name: String,
        account: Option<AccountId>,
        sender: EventSender,
    ) -> Result<(), GameError> {
        self.ensure_unseated(conn, account.as_ref())?;

        let handle = self
            .lobbies
            .get(&lobby_id)
            .ok_or(GameError::LobbyNotFound)?;
        handle.join(conn, name, account.clone(), sender).await?;

        self.by_conn.insert(conn, lobby_id.clone());
        if let Some(account) = account {
            self.by_account.insert(account, lobby_id);
        }
        Ok(())
    }

    /// Removes `conn` from its lobby, confirming to the leaver.
    pub async fn leave_lobby(&mut self, conn: ConnectionId) -> Result<(), GameError> {
        self.release(conn, true).await.ok_or(GameError::NotInLobby)
    }

    /// Removes a dropped connection from its lobby, if it was in one.
    /// Unlike an explicit leave, an unseated connection is not an error.
    pub async fn disconnect(&mut self, conn: ConnectionId) {
        self.release(conn, false).await;
    }

    /// Shared leave path. Returns `None` when `conn` held no seat.
    async fn release(&mut self, conn: ConnectionId, notify: bool) -> Option<()> {
        let lobby_id = self.by_conn.remove(&conn)?;
        let handle = self.lobbies.get(&lobby_id)?.clone();

        let outcome = handle.leave(conn, notify).await;
        if let Some(account) = outcome.departed.and_then(|d| d.account) {
            self.by_account.remove(&account);
        }
        if outcome.now_empty {
            self.lobbies.remove(&lobby_id);
            tracing::info!(%lobby_id, "empty lobby destroyed");
        }
        Some(())
    }

    /// Routes a gameplay action from a connection to its lobby actor.
    pub async fn dispatch(
        &self,
        conn: ConnectionId,
        action: GameAction,
    ) -> Result<(), GameError> {
        let lobby_id = self.by_conn.get(&conn).ok_or(GameError::NotInLobby)?;
        let handle = self
            .lobbies
            .get(lobby_id)
            .ok_or(GameError::LobbyNotFound)?;
        handle.action(conn, action).await
    }

    /// Summaries of every lobby still gathering players.
    ///
    /// Queries each actor for its current summary. Lobbies that fail to
    /// respond (stopping) are silently skipped.
    pub async fn list_lobbies(&self) -> Vec<LobbySummary> {
        let mut summaries = Vec::with_capacity(self.lobbies.len());
        for handle in self.lobbies.values() {
            if let Some(summary) = handle.summary().await {
                if summary.status.is_open() {
                    summaries.push(summary);
                }
            }
        }
        summaries
    }

    /// Shuts every lobby down, notifying seated players. For server stop.
    pub async fn close_all(&mut self) {
        for (lobby_id, handle) in self.lobbies.drain() {
            handle.shutdown().await;
            tracing::info!(%lobby_id, "lobby closed");
        }
        self.by_conn.clear();
        self.by_account.clear();
    }

    /// The lobby code a connection currently occupies, if any.
    pub fn lobby_of(&self, conn: ConnectionId) -> Option<&LobbyId> {
        self.by_conn.get(&conn)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    fn ensure_unseated(
        &self,
        conn: ConnectionId,
        account: Option<&AccountId>,
    ) -> Result<(), GameError> {
        if self.by_conn.contains_key(&conn) {
            return Err(GameError::AlreadyInLobby);
        }
        if let Some(account) = account {
            if self.by_account.contains_key(account) {
                return Err(GameError::AlreadyInLobby);
            }
        }
        Ok(())
    }
}
