//! Game orchestration for Triviarena.
//!
//! Each lobby runs as an isolated Tokio task (actor model) owning its
//! membership, scores, power books, question supply, and the round timer.
//!
//! # Key types
//!
//! - [`LobbyRegistry`] — creates/destroys lobbies, routes connections
//! - [`GameAction`] — gameplay requests a connection can send its lobby
//! - [`GameConfig`] — pacing, scoring threshold, and supply tuning
//! - [`RankingStore`] — persistence seam for win counts
//! - [`GameError`] — every way a request can be refused

mod config;
mod error;
mod ranking;
mod registry;
mod round;
mod session;

pub use config::GameConfig;
pub use error::GameError;
pub use ranking::{NoopRankingStore, RankingError, RankingStore};
pub use registry::LobbyRegistry;
pub use round::{score_for_latency, BASE_POINTS, MAX_TIME_BONUS};
pub use session::{EventSender, GameAction};
