//! The question model shared by every layer above this crate.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How hard a question is meant to be.
///
/// Serialized in lowercase so providers and clients can exchange it as a
/// plain string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Weighted draw used when requesting new content: easy and medium
    /// twice as likely as hard.
    pub fn random_weighted() -> Self {
        const MIX: [Difficulty; 5] = [
            Difficulty::Easy,
            Difficulty::Easy,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Hard,
        ];
        let mut rng = rand::rng();
        MIX[rng.random_range(0..MIX.len())]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single multiple-choice question.
///
/// `correct_index` points into `options` and never leaves the server
/// before the answer is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub difficulty: Difficulty,
    pub category: String,
    pub explanation: String,
}

impl Question {
    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_index
    }
}

/// Last-resort question used when no provider answers in time for a
/// round start. Rounds always begin even with the content source down.
pub fn fallback_question() -> Question {
    Question {
        text: "What is the capital of France?".to_string(),
        options: vec![
            "Paris".to_string(),
            "London".to_string(),
            "Berlin".to_string(),
            "Madrid".to_string(),
        ],
        correct_index: 0,
        difficulty: Difficulty::Easy,
        category: "Geography".to_string(),
        explanation: "The correct answer is: Paris".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_as_str_matches_wire_form() {
        assert_eq!(Difficulty::Easy.as_str(), "easy");
        assert_eq!(Difficulty::Medium.as_str(), "medium");
        assert_eq!(Difficulty::Hard.as_str(), "hard");
    }

    #[test]
    fn test_difficulty_serializes_lowercase() {
        let json = serde_json::to_string(&Difficulty::Hard).unwrap();
        assert_eq!(json, "\"hard\"");

        let back: Difficulty = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, Difficulty::Medium);
    }

    #[test]
    fn test_random_weighted_only_yields_known_levels() {
        for _ in 0..50 {
            let d = Difficulty::random_weighted();
            assert!(matches!(
                d,
                Difficulty::Easy | Difficulty::Medium | Difficulty::Hard
            ));
        }
    }

    #[test]
    fn test_is_correct_checks_index() {
        let q = fallback_question();
        assert!(q.is_correct(0));
        assert!(!q.is_correct(1));
        assert!(!q.is_correct(3));
    }

    #[test]
    fn test_fallback_question_is_well_formed() {
        let q = fallback_question();
        assert_eq!(q.options.len(), 4);
        assert!(q.correct_index < q.options.len());
        assert!(!q.text.is_empty());
        assert!(!q.explanation.is_empty());
    }
}
