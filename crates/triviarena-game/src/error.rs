//! Game-level errors.
//!
//! Every variant is a recoverable, user-facing refusal reported to the
//! originating connection only. None of them tears down a lobby or the
//! process.

use thiserror::Error;

use triviarena_lobby::LobbyError;
use triviarena_powers::PowerError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("you are not in a lobby")]
    NotInLobby,

    #[error("lobby not found")]
    LobbyNotFound,

    #[error("lobby is full")]
    LobbyFull,

    #[error("the game has already started")]
    GameAlreadyStarted,

    #[error("only the host can do that")]
    NotHost,

    #[error("not all players are ready")]
    PlayersNotReady,

    #[error("no game is running")]
    NoActiveGame,

    #[error("you already answered this question")]
    AlreadyAnswered,

    #[error("unknown power type: {0}")]
    InvalidPowerType(String),

    #[error("{0} already used this round")]
    PowerAlreadyUsedThisRound(String),

    #[error("not enough points: need {needed}, have {have}")]
    InsufficientPoints { needed: u32, have: u32 },

    #[error("no more questions available")]
    QuestionSupplyExhausted,

    #[error("you are already in a lobby")]
    AlreadyInLobby,

    #[error("that account is already seated in this lobby")]
    DuplicateIdentity,
}

impl GameError {
    /// Power refusals go out as a dedicated event so clients can show
    /// them inline next to the power buttons.
    pub fn is_power_error(&self) -> bool {
        matches!(
            self,
            GameError::InvalidPowerType(_)
                | GameError::PowerAlreadyUsedThisRound(_)
                | GameError::InsufficientPoints { .. }
        )
    }
}

impl From<LobbyError> for GameError {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::Full => GameError::LobbyFull,
            LobbyError::DuplicateIdentity => GameError::DuplicateIdentity,
            LobbyError::NotAMember => GameError::NotInLobby,
        }
    }
}

impl From<PowerError> for GameError {
    fn from(err: PowerError) -> Self {
        match err {
            PowerError::InvalidType(raw) => GameError::InvalidPowerType(raw),
            PowerError::AlreadyUsedThisRound(power) => {
                GameError::PowerAlreadyUsedThisRound(power.as_str().to_string())
            }
            PowerError::InsufficientPoints { needed, have, .. } => {
                GameError::InsufficientPoints { needed, have }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triviarena_powers::PowerType;

    #[test]
    fn test_power_errors_are_flagged() {
        assert!(GameError::InvalidPowerType("x".into()).is_power_error());
        assert!(GameError::PowerAlreadyUsedThisRound("fifty_fifty".into()).is_power_error());
        assert!(GameError::InsufficientPoints { needed: 150, have: 100 }.is_power_error());
        assert!(!GameError::NotHost.is_power_error());
        assert!(!GameError::AlreadyAnswered.is_power_error());
    }

    #[test]
    fn test_lobby_error_conversion() {
        assert_eq!(GameError::from(LobbyError::Full), GameError::LobbyFull);
        assert_eq!(
            GameError::from(LobbyError::DuplicateIdentity),
            GameError::DuplicateIdentity
        );
        assert_eq!(GameError::from(LobbyError::NotAMember), GameError::NotInLobby);
    }

    #[test]
    fn test_power_error_conversion_keeps_details() {
        let err = GameError::from(PowerError::InsufficientPoints {
            power: PowerType::FiftyFifty,
            needed: 150,
            have: 100,
        });
        assert_eq!(err, GameError::InsufficientPoints { needed: 150, have: 100 });
        assert_eq!(err.to_string(), "not enough points: need 150, have 100");
    }
}
