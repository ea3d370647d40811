//! Per-question round state and scoring.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use triviarena_protocol::ConnectionId;
use triviarena_questions::Question;

/// Base points for any correct answer.
pub const BASE_POINTS: u32 = 1000;

/// Ceiling of the speed bonus, reached only on an instant answer.
pub const MAX_TIME_BONUS: u32 = 500;

/// Points for a correct answer at the given response latency:
/// `1000 + max(0, 500 − floor(latency_secs × 20))`. The bonus decays to
/// zero at 25 seconds; slower correct answers still earn the base.
pub fn score_for_latency(latency: Duration) -> u32 {
    let decay = (latency.as_secs_f64() * 20.0).floor() as u32;
    BASE_POINTS + MAX_TIME_BONUS.saturating_sub(decay)
}

/// One player's recorded answer for the current question.
///
/// `option_index` is `None` for the synthetic record written when the
/// answer window closes without a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub option_index: Option<usize>,
    pub is_correct: bool,
    pub points: u32,
    pub latency: Duration,
}

impl AnswerRecord {
    /// The zero-point record given to players who never answered.
    pub fn timed_out(latency: Duration) -> Self {
        Self {
            option_index: None,
            is_correct: false,
            points: 0,
            latency,
        }
    }
}

/// Transient state for one question in flight.
///
/// `participants` is frozen at delivery time: players who join the
/// lobby mid-question are not waited for and enter play at the next
/// question.
#[derive(Debug)]
pub struct RoundState {
    question: Question,
    question_number: u32,
    delivered_at: Instant,
    participants: HashSet<ConnectionId>,
    answers: HashMap<ConnectionId, AnswerRecord>,
}

impl RoundState {
    pub fn new(
        question: Question,
        question_number: u32,
        delivered_at: Instant,
        participants: HashSet<ConnectionId>,
    ) -> Self {
        Self {
            question,
            question_number,
            delivered_at,
            participants,
            answers: HashMap::new(),
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn question_number(&self) -> u32 {
        self.question_number
    }

    /// Time since the question went out.
    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.delivered_at
    }

    pub fn has_answered(&self, conn: ConnectionId) -> bool {
        self.answers.contains_key(&conn)
    }

    pub fn is_participant(&self, conn: ConnectionId) -> bool {
        self.participants.contains(&conn)
    }

    /// Records an answer. At most one per connection per question; the
    /// caller checks [`Self::has_answered`] first.
    pub fn record(&mut self, conn: ConnectionId, answer: AnswerRecord) {
        self.answers.insert(conn, answer);
    }

    /// `(answered, expected)` counts for progress notices.
    pub fn progress(&self) -> (usize, usize) {
        let answered = self
            .participants
            .iter()
            .filter(|c| self.answers.contains_key(c))
            .count();
        (answered, self.participants.len())
    }

    pub fn all_answered(&self) -> bool {
        !self.participants.is_empty()
            && self
                .participants
                .iter()
                .all(|c| self.answers.contains_key(c))
    }

    /// Participants with no recorded answer yet.
    pub fn unanswered(&self) -> Vec<ConnectionId> {
        self.participants
            .iter()
            .filter(|c| !self.answers.contains_key(c))
            .copied()
            .collect()
    }

    /// Removes a departed player so they no longer block completion.
    pub fn drop_participant(&mut self, conn: ConnectionId) {
        self.participants.remove(&conn);
        self.answers.remove(&conn);
    }
}
