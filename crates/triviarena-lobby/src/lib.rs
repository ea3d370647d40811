//! Lobby membership for Triviarena.
//!
//! This crate is the pure, synchronous heart of who-is-in-the-room: seats,
//! the single-host invariant, join-order succession, ready flags, and the
//! lobby lifecycle status. It performs no IO and spawns no tasks, which is
//! what makes the membership rules exhaustively unit-testable.
//!
//! ```text
//! waiting ──▶ playing ──▶ round_finished ──▶ waiting_new_round
//!    ▲           ▲                │                  │
//!    │           └────────────────│──────all ready───┘
//!    └──────────back to lobby─────┘
//! ```
//!
//! The async layer above (the game session actor) drives these transitions;
//! this crate only enforces that each mutation leaves the membership
//! invariants intact.

mod error;
mod lobby;
mod player;

pub use error::LobbyError;
pub use lobby::{
    DEFAULT_MAX_PLAYERS, Departure, Lobby, MAX_MAX_PLAYERS, MIN_MAX_PLAYERS,
    clamp_max_players,
};
pub use player::Player;
