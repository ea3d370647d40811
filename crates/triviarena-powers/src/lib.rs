//! Power-ups for trivia rounds.
//!
//! A [`PowerBook`] tracks one player's purchases within a round: the
//! fixed three-entry catalog, the 1.5x live-score surcharge, the
//! one-use-per-round rule, and the pending double-points effect that
//! only a correct answer spends.

pub mod book;
pub mod catalog;
pub mod error;

pub use book::{PowerBook, PowerUse};
pub use catalog::{
    PowerEffect, PowerGrant, PowerType, DOUBLE_POINTS_MULTIPLIER, SURCHARGE,
    TIME_BOOST_EXTRA_SECS,
};
pub use error::PowerError;
