//! Wire protocol for Triviarena.
//!
//! This crate defines the language that trivia clients and the server speak:
//!
//! - **Types** ([`ClientAction`], [`ServerEvent`], snapshots, ids): the
//!   frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are converted
//!   to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between the WebSocket transport (raw frames) and
//! the game layer (lobby state). It knows nothing about lobbies or scoring;
//! it only knows shapes.
//!
//! ```text
//! WebSocket (bytes) → Protocol (ClientAction) → Game (state transitions)
//!                   ← Protocol (ServerEvent)  ←
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AccountId, ClientAction, ConnectionId, LobbyId, LobbySnapshot, LobbyStatus,
    LobbySummary, PlayerSnapshot, PowerEffectView, PowerGrantView, QuestionView,
    RankEntry, Recipient, ServerEvent,
};
