//! Error types for lobby membership.

/// Errors raised by membership mutations.
///
/// These cover seat-level rules only; game-flow errors (not host, game
/// already started, ...) belong to the session layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Every seat is taken.
    #[error("lobby is full")]
    Full,

    /// The joining account already holds a seat in this lobby.
    #[error("this identity already holds a seat in the lobby")]
    DuplicateIdentity,

    /// The connection has no seat here.
    #[error("player is not a member of this lobby")]
    NotAMember,
}
