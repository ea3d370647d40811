//! Content source seam.
//!
//! The game engine never talks to a provider directly; it goes through
//! [`QuestionSource`] so deployments can plug in an HTTP service, a
//! database, or the built-in [`StaticPool`] without touching game code.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::question::{Difficulty, Question};

/// Errors a content provider can report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("question provider unavailable: {0}")]
    Unavailable(String),

    #[error("question provider has no more content")]
    Exhausted,
}

/// Pluggable supplier of questions.
///
/// A fetch failure is never fatal to the caller: the supply retries on
/// its refill interval and round starts fall back to a built-in
/// question.
pub trait QuestionSource: Send + Sync + 'static {
    fn fetch(
        &self,
        difficulty: Difficulty,
    ) -> impl std::future::Future<Output = Result<Question, SourceError>> + Send;
}

/// In-process source backed by a fixed list of questions.
///
/// Fetches rotate through the pool, preferring the requested difficulty
/// and falling back to any level when that difficulty is missing.
pub struct StaticPool {
    questions: Vec<Question>,
    cursor: AtomicUsize,
}

impl StaticPool {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            cursor: AtomicUsize::new(0),
        }
    }

    /// A small general-knowledge set covering every difficulty, enough
    /// to run a server without any external provider.
    pub fn with_default_questions() -> Self {
        fn q(
            text: &str,
            options: [&str; 4],
            correct_index: usize,
            difficulty: Difficulty,
            category: &str,
        ) -> Question {
            Question {
                text: text.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
                correct_index,
                difficulty,
                category: category.to_string(),
                explanation: format!("The correct answer is: {}", options[correct_index]),
            }
        }

        Self::new(vec![
            q(
                "Which planet is known as the Red Planet?",
                ["Venus", "Jupiter", "Mars", "Mercury"],
                2,
                Difficulty::Easy,
                "Science",
            ),
            q(
                "How many continents are there on Earth?",
                ["Six", "Seven", "Five", "Eight"],
                1,
                Difficulty::Easy,
                "Geography",
            ),
            q(
                "What is the largest ocean on Earth?",
                ["Pacific", "Atlantic", "Indian", "Arctic"],
                0,
                Difficulty::Easy,
                "Geography",
            ),
            q(
                "In which year did the Berlin Wall fall?",
                ["1987", "1989", "1991", "1993"],
                1,
                Difficulty::Medium,
                "History",
            ),
            q(
                "Which element has the chemical symbol Fe?",
                ["Fluorine", "Lead", "Iron", "Tin"],
                2,
                Difficulty::Medium,
                "Science",
            ),
            q(
                "Who painted the ceiling of the Sistine Chapel?",
                ["Raphael", "Leonardo da Vinci", "Caravaggio", "Michelangelo"],
                3,
                Difficulty::Medium,
                "Art",
            ),
            q(
                "What is the smallest prime number greater than 100?",
                ["101", "103", "107", "109"],
                0,
                Difficulty::Hard,
                "Mathematics",
            ),
            q(
                "Which country has the longest coastline in the world?",
                ["Russia", "Australia", "Canada", "Norway"],
                2,
                Difficulty::Hard,
                "Geography",
            ),
            q(
                "In what year was the first Nobel Prize awarded?",
                ["1895", "1899", "1901", "1905"],
                2,
                Difficulty::Hard,
                "History",
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionSource for StaticPool {
    async fn fetch(&self, difficulty: Difficulty) -> Result<Question, SourceError> {
        if self.questions.is_empty() {
            return Err(SourceError::Exhausted);
        }
        let n = self.questions.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..n {
            let q = &self.questions[(start + offset) % n];
            if q.difficulty == difficulty {
                return Ok(q.clone());
            }
        }
        Ok(self.questions[start % n].clone())
    }
}
