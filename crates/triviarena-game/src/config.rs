//! Game pacing and scoring configuration.

use std::time::Duration;

use triviarena_questions::SupplyConfig;

/// Tuning for a lobby's game loop. One copy per lobby actor.
#[derive(Debug, Clone, Copy)]
pub struct GameConfig {
    /// Total score that ends the round with a winner.
    pub win_score: u32,
    /// Answer window per question, in seconds. Sent to clients verbatim.
    pub question_secs: u64,
    /// Grace added to the answer window before the server auto-advances,
    /// absorbing client clock skew and transit time.
    pub timeout_margin: Duration,
    /// Pause between the game-start notice and the first question.
    pub first_question_delay: Duration,
    /// Pause before the next question once everyone has answered.
    pub next_after_all_answered: Duration,
    /// Pause before the next question after a timeout advance.
    pub next_after_timeout: Duration,
    /// Pause between a winning answer and the round-end announcement.
    pub win_delay: Duration,
    /// Prefetch tuning for the lobby's question supply.
    pub supply: SupplyConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_score: 10_000,
            question_secs: 30,
            timeout_margin: Duration::from_secs(2),
            first_question_delay: Duration::from_secs(2),
            next_after_all_answered: Duration::from_secs(3),
            next_after_timeout: Duration::from_secs(2),
            win_delay: Duration::from_secs(2),
            supply: SupplyConfig::default(),
        }
    }
}

impl GameConfig {
    /// The client-facing answer window.
    pub fn question_duration(&self) -> Duration {
        Duration::from_secs(self.question_secs)
    }

    /// When the server gives up waiting for answers, measured from
    /// question delivery.
    pub fn answer_cutoff(&self) -> Duration {
        self.question_duration() + self.timeout_margin
    }
}
