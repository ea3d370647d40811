//! A seated player within a lobby.

use triviarena_protocol::{AccountId, ConnectionId, PlayerSnapshot};

/// One seat in a lobby.
///
/// Lives exactly as long as the connection holds the seat; a reconnecting
/// player is a brand-new `Player`. The `account` link is what survives
/// across sessions (it keys the external ranking store) and is never shown
/// to other players.
#[derive(Debug, Clone)]
pub struct Player {
    pub connection_id: ConnectionId,
    pub name: String,
    /// Stable identity for ranking persistence; `None` for anonymous play.
    pub account: Option<AccountId>,
    pub is_host: bool,
    pub ready: bool,
    pub score: u32,
}

impl Player {
    /// Creates the lobby's founding player. Hosts start ready; they are the
    /// ones who decide when the game begins.
    pub fn host(connection_id: ConnectionId, name: impl Into<String>, account: Option<AccountId>) -> Self {
        Self {
            connection_id,
            name: name.into(),
            account,
            is_host: true,
            ready: true,
            score: 0,
        }
    }

    /// Creates a joining player. Guests must toggle ready themselves.
    pub fn guest(connection_id: ConnectionId, name: impl Into<String>, account: Option<AccountId>) -> Self {
        Self {
            connection_id,
            name: name.into(),
            account,
            is_host: false,
            ready: false,
            score: 0,
        }
    }

    /// The client-visible view of this seat.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            connection_id: self.connection_id,
            name: self.name.clone(),
            is_host: self.is_host,
            ready: self.ready,
            score: self.score,
        }
    }
}
