use std::fmt;
use thiserror::Error;

/// Minimum number of contestants a race can be configured with
pub const MIN_CONTESTANTS: usize = 2;

/// Reason a stake was refused by the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum StakeRejection {
    /// Amount was zero, negative or not a number
    NonPositiveAmount(f64),
    /// Amount exceeds what the actor currently holds
    InsufficientFunds { requested: f64, available: f64 },
}

impl fmt::Display for StakeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeRejection::NonPositiveAmount(amount) => {
                write!(f, "stake amount must be positive, got {}", amount)
            }
            StakeRejection::InsufficientFunds {
                requested,
                available,
            } => write!(
                f,
                "insufficient funds: requested {:.2}, available {:.2}",
                requested, available
            ),
        }
    }
}

/// Race and ledger errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RaceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid stake: {0}")]
    InvalidStake(StakeRejection),

    #[error("Unknown contestant: {0}")]
    UnknownContestant(String),

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    #[error("A race is already in progress")]
    RaceInProgress,

    #[error("No race in progress")]
    NoRaceInProgress,

    #[error("Race driver failed: {0}")]
    Driver(String),
}

impl From<StakeRejection> for RaceError {
    fn from(rejection: StakeRejection) -> Self {
        RaceError::InvalidStake(rejection)
    }
}

/// Validation functions
pub fn validate_distance(distance: u32) -> Result<(), RaceError> {
    if distance == 0 {
        return Err(RaceError::Configuration(
            "Race distance must be positive, got 0".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_contestant_count(count: usize) -> Result<(), RaceError> {
    if count < MIN_CONTESTANTS {
        return Err(RaceError::Configuration(format!(
            "At least {} contestants required, got {}",
            MIN_CONTESTANTS, count
        )));
    }
    Ok(())
}

pub fn validate_stake_amount(amount: f64, available: f64) -> Result<(), StakeRejection> {
    // NaN fails this comparison too
    if !(amount > 0.0) {
        return Err(StakeRejection::NonPositiveAmount(amount));
    }
    if amount > available {
        return Err(StakeRejection::InsufficientFunds {
            requested: amount,
            available,
        });
    }
    Ok(())
}
