//! Per-player purchase state for one round.

use std::collections::HashSet;

use crate::catalog::{
    PowerEffect, PowerGrant, PowerType, DOUBLE_POINTS_MULTIPLIER, TIME_BOOST_EXTRA_SECS,
};
use crate::error::PowerError;

/// Outcome of a successful purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerUse {
    pub power: PowerType,
    /// Surcharged price actually deducted.
    pub cost: u32,
    pub remaining_points: u32,
    pub effect: PowerEffect,
}

/// One player's power state within a round.
///
/// Each type can be bought at most once per round; a double-points
/// purchase stays pending until a correct answer spends it, surviving
/// question changes within the round.
#[derive(Debug, Default, Clone)]
pub struct PowerBook {
    consumed: HashSet<PowerType>,
    pending_double: Option<u32>,
}

impl PowerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full catalog as offered for the upcoming question. Types
    /// consumed earlier in the round stay listed, flagged consumed.
    /// Costs shown are catalog base costs; the surcharge applies at
    /// use time.
    pub fn grants(&self) -> Vec<PowerGrant> {
        PowerType::ALL
            .iter()
            .map(|&power| PowerGrant {
                power,
                cost: power.base_cost(),
                consumed: self.consumed.contains(&power),
            })
            .collect()
    }

    /// Checks a purchase without performing it.
    pub fn can_use(&self, raw: &str, points: u32) -> Result<PowerType, PowerError> {
        let power: PowerType = raw.parse()?;
        if self.consumed.contains(&power) {
            return Err(PowerError::AlreadyUsedThisRound(power));
        }
        let needed = power.surcharged_cost();
        if points < needed {
            return Err(PowerError::InsufficientPoints {
                power,
                needed,
                have: points,
            });
        }
        Ok(power)
    }

    /// Buys a power: deducts the surcharged cost from `points`, marks
    /// the type consumed for the round, and reports the effect. Costs
    /// are never refunded.
    pub fn use_power(&mut self, raw: &str, points: u32) -> Result<PowerUse, PowerError> {
        let power = self.can_use(raw, points)?;
        let cost = power.surcharged_cost();
        self.consumed.insert(power);

        let effect = match power {
            PowerType::FiftyFifty => PowerEffect::FiftyFifty,
            PowerType::DoublePoints => {
                self.pending_double = Some(DOUBLE_POINTS_MULTIPLIER);
                PowerEffect::DoublePoints {
                    multiplier: DOUBLE_POINTS_MULTIPLIER,
                }
            }
            PowerType::TimeBoost => PowerEffect::TimeBoost {
                extra_seconds: TIME_BOOST_EXTRA_SECS,
            },
        };

        Ok(PowerUse {
            power,
            cost,
            remaining_points: points - cost,
            effect,
        })
    }

    pub fn pending_double(&self) -> Option<u32> {
        self.pending_double
    }

    /// Spends a pending double-points effect. Called when a correct
    /// answer lands; a wrong answer leaves the effect pending.
    pub fn consume_double(&mut self) -> Option<u32> {
        self.pending_double.take()
    }

    /// Clears consumption and any pending effect. Runs between rounds,
    /// never between questions.
    pub fn reset_for_new_round(&mut self) {
        self.consumed.clear();
        self.pending_double = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_fresh_book_offers_full_catalog() {
        let book = PowerBook::new();
        let grants = book.grants();
        assert_eq!(grants.len(), 3);
        assert!(grants.iter().all(|g| !g.consumed));
        assert_eq!(grants[0].cost, 100);
        assert_eq!(grants[1].cost, 300);
        assert_eq!(grants[2].cost, 50);
    }

    #[test]
    fn test_use_power_deducts_surcharged_cost() {
        let mut book = PowerBook::new();
        let outcome = book.use_power("fifty_fifty", 200).unwrap();
        assert_eq!(outcome.power, PowerType::FiftyFifty);
        assert_eq!(outcome.cost, 150);
        assert_eq!(outcome.remaining_points, 50);
        assert_eq!(outcome.effect, PowerEffect::FiftyFifty);
    }

    #[test]
    fn test_use_power_insufficient_points_refused() {
        let mut book = PowerBook::new();
        let err = book.use_power("fifty_fifty", 100).unwrap_err();
        assert_eq!(
            err,
            PowerError::InsufficientPoints {
                power: PowerType::FiftyFifty,
                needed: 150,
                have: 100,
            }
        );
        assert!(book.grants().iter().all(|g| !g.consumed));
    }

    #[test]
    fn test_use_power_unknown_type_refused() {
        let mut book = PowerBook::new();
        let err = book.use_power("mega_blast", 10_000).unwrap_err();
        assert_eq!(err, PowerError::InvalidType("mega_blast".to_string()));
    }

    #[test]
    fn test_use_power_twice_in_round_refused() {
        let mut book = PowerBook::new();
        book.use_power("time_boost", 500).unwrap();
        let err = book.use_power("time_boost", 500).unwrap_err();
        assert_eq!(err, PowerError::AlreadyUsedThisRound(PowerType::TimeBoost));
    }

    #[test]
    fn test_consumed_type_stays_listed_in_grants() {
        let mut book = PowerBook::new();
        book.use_power("double_points", 1000).unwrap();
        let grants = book.grants();
        assert_eq!(grants.len(), 3);
        let double = grants
            .iter()
            .find(|g| g.power == PowerType::DoublePoints)
            .unwrap();
        assert!(double.consumed);
        assert_eq!(
            grants.iter().filter(|g| g.consumed).count(),
            1,
            "only the used type is flagged"
        );
    }

    #[test]
    fn test_double_points_sets_pending_effect() {
        let mut book = PowerBook::new();
        let outcome = book.use_power("double_points", 500).unwrap();
        assert_eq!(outcome.effect, PowerEffect::DoublePoints { multiplier: 2 });
        assert_eq!(book.pending_double(), Some(2));
    }

    #[test]
    fn test_consume_double_spends_pending_once() {
        let mut book = PowerBook::new();
        book.use_power("double_points", 500).unwrap();
        assert_eq!(book.consume_double(), Some(2));
        assert_eq!(book.consume_double(), None);
    }

    #[test]
    fn test_pending_double_survives_question_changes() {
        let mut book = PowerBook::new();
        book.use_power("double_points", 500).unwrap();
        // Grant regeneration between questions must not clear it.
        let _ = book.grants();
        assert_eq!(book.pending_double(), Some(2));
    }

    #[test]
    fn test_time_boost_effect_adds_ten_seconds() {
        let mut book = PowerBook::new();
        let outcome = book.use_power("time_boost", 75).unwrap();
        assert_eq!(outcome.effect, PowerEffect::TimeBoost { extra_seconds: 10 });
        assert_eq!(outcome.remaining_points, 0);
    }

    #[test]
    fn test_reset_for_new_round_restores_availability() {
        let mut book = PowerBook::new();
        book.use_power("fifty_fifty", 200).unwrap();
        book.use_power("double_points", 500).unwrap();
        book.reset_for_new_round();

        assert!(book.grants().iter().all(|g| !g.consumed));
        assert_eq!(book.pending_double(), None);
        assert!(book.use_power("fifty_fifty", 200).is_ok());
    }

    #[test]
    fn test_can_use_does_not_consume() {
        let book = PowerBook::new();
        assert_eq!(book.can_use("fifty_fifty", 150), Ok(PowerType::FiftyFifty));
        assert!(book.grants().iter().all(|g| !g.consumed));
    }
}
