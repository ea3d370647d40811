//! Question content for trivia games.
//!
//! Three pieces live here: the [`Question`] model itself, the
//! [`QuestionSource`] seam a deployment implements to plug in its
//! provider, and the [`QuestionSupply`] prefetch queue a running game
//! drains between rounds.

pub mod question;
pub mod source;
pub mod supply;

pub use question::{fallback_question, Difficulty, Question};
pub use source::{QuestionSource, SourceError, StaticPool};
pub use supply::{QuestionSupply, SupplyConfig};
