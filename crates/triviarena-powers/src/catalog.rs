//! The fixed power-up catalog.

use std::str::FromStr;

use crate::error::PowerError;

/// Multiplier applied to catalog base cost when a power is paid for
/// with live score.
pub const SURCHARGE: f64 = 1.5;

/// Points multiplier granted by double points.
pub const DOUBLE_POINTS_MULTIPLIER: u32 = 2;

/// Extra answer time granted by time boost.
pub const TIME_BOOST_EXTRA_SECS: u64 = 10;

/// The three purchasable powers. The catalog is fixed; unknown wire
/// identifiers are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerType {
    FiftyFifty,
    DoublePoints,
    TimeBoost,
}

impl PowerType {
    pub const ALL: [PowerType; 3] = [
        PowerType::FiftyFifty,
        PowerType::DoublePoints,
        PowerType::TimeBoost,
    ];

    /// Catalog price before the live-score surcharge.
    pub fn base_cost(self) -> u32 {
        match self {
            PowerType::FiftyFifty => 100,
            PowerType::DoublePoints => 300,
            PowerType::TimeBoost => 50,
        }
    }

    /// What a player actually pays: `round(base_cost × 1.5)`.
    pub fn surcharged_cost(self) -> u32 {
        (self.base_cost() as f64 * SURCHARGE).round() as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerType::FiftyFifty => "fifty_fifty",
            PowerType::DoublePoints => "double_points",
            PowerType::TimeBoost => "time_boost",
        }
    }
}

impl FromStr for PowerType {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifty_fifty" => Ok(PowerType::FiftyFifty),
            "double_points" => Ok(PowerType::DoublePoints),
            "time_boost" => Ok(PowerType::TimeBoost),
            other => Err(PowerError::InvalidType(other.to_string())),
        }
    }
}

impl std::fmt::Display for PowerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry as offered to a player for the upcoming question.
/// `cost` is the catalog base cost; the actual charge at use time adds
/// the surcharge. `consumed` means the type was already used this round
/// and stays unavailable until the round resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerGrant {
    pub power: PowerType,
    pub cost: u32,
    pub consumed: bool,
}

/// What a successful purchase does. Fifty-fifty is resolved by the
/// game layer, which knows the current question's correct index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEffect {
    FiftyFifty,
    DoublePoints { multiplier: u32 },
    TimeBoost { extra_seconds: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_costs_match_catalog() {
        assert_eq!(PowerType::FiftyFifty.base_cost(), 100);
        assert_eq!(PowerType::DoublePoints.base_cost(), 300);
        assert_eq!(PowerType::TimeBoost.base_cost(), 50);
    }

    #[test]
    fn test_surcharged_cost_is_one_and_a_half_times_base() {
        assert_eq!(PowerType::FiftyFifty.surcharged_cost(), 150);
        assert_eq!(PowerType::DoublePoints.surcharged_cost(), 450);
        assert_eq!(PowerType::TimeBoost.surcharged_cost(), 75);
        for power in PowerType::ALL {
            assert_eq!(
                power.surcharged_cost(),
                (power.base_cost() as f64 * 1.5).round() as u32
            );
        }
    }

    #[test]
    fn test_from_str_accepts_wire_identifiers() {
        assert_eq!("fifty_fifty".parse::<PowerType>(), Ok(PowerType::FiftyFifty));
        assert_eq!(
            "double_points".parse::<PowerType>(),
            Ok(PowerType::DoublePoints)
        );
        assert_eq!("time_boost".parse::<PowerType>(), Ok(PowerType::TimeBoost));
    }

    #[test]
    fn test_from_str_rejects_unknown_identifier() {
        let err = "mega_blast".parse::<PowerType>().unwrap_err();
        assert_eq!(err, PowerError::InvalidType("mega_blast".to_string()));
    }

    #[test]
    fn test_as_str_round_trips() {
        for power in PowerType::ALL {
            assert_eq!(power.as_str().parse::<PowerType>(), Ok(power));
        }
    }
}
