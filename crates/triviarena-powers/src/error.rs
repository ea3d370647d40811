use thiserror::Error;

use crate::catalog::PowerType;

/// Why a power purchase was refused. Sent back to the buyer only,
/// never broadcast.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowerError {
    #[error("unknown power type: {0}")]
    InvalidType(String),

    #[error("{0} already used this round")]
    AlreadyUsedThisRound(PowerType),

    #[error("not enough points: {power} costs {needed}, you have {have}")]
    InsufficientPoints {
        power: PowerType,
        needed: u32,
        have: u32,
    },
}
