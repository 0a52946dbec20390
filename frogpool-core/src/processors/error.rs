use crate::chain::ChainError;
use crate::store::StoreError;
use frogpool_sdk::objects::ErrorCategory;

/// Failure of a game operation.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("no active frog")]
    NoActiveFrog,
    #[error("already playing in pool {0}")]
    AlreadyInPool(i64),
    #[error("pool {0} is full")]
    PoolFull(i64),
    #[error("pool {0} is not collecting players")]
    NotCollecting(i64),
    #[error("pool {0} is not active")]
    PoolNotActive(i64),
    #[error("pool {0} is already completed")]
    AlreadyCompleted(i64),
    #[error("frog is not a participant of pool {0}")]
    NotAParticipant(i64),
    #[error("the big prize is not visible to this player")]
    NotPrizeHolder,
    #[error("activation payment could not be verified")]
    PaymentNotVerified,
    #[error("activation transaction was already used")]
    TransactionAlreadyUsed,
    #[error("no pool could be joined after {0} attempts")]
    JoinFailed(u32),
    #[error("nothing to claim")]
    NothingToClaim,
    #[error("claim amount does not match the unclaimed balance")]
    ClaimAmountMismatch,
    #[error("concurrent update, try again")]
    Contended,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for GameError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateActivation(_) => GameError::TransactionAlreadyUsed,
            other => GameError::Store(other),
        }
    }
}

impl GameError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GameError::InvalidInput(_)
            | GameError::PaymentNotVerified
            | GameError::NothingToClaim
            | GameError::ClaimAmountMismatch => ErrorCategory::Validation,
            GameError::NotFound { .. } | GameError::NoActiveFrog => ErrorCategory::NotFound,
            GameError::AlreadyInPool(_)
            | GameError::PoolFull(_)
            | GameError::NotCollecting(_)
            | GameError::PoolNotActive(_)
            | GameError::AlreadyCompleted(_)
            | GameError::NotAParticipant(_)
            | GameError::NotPrizeHolder
            | GameError::TransactionAlreadyUsed
            | GameError::JoinFailed(_)
            | GameError::Contended => ErrorCategory::Conflict,
            GameError::Chain(_) => ErrorCategory::Chain,
            GameError::Store(_) => ErrorCategory::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_activation_maps_to_conflict() {
        let err: GameError = StoreError::DuplicateActivation("sig".into()).into();
        assert!(matches!(err, GameError::TransactionAlreadyUsed));
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            GameError::InvalidInput("x".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(GameError::NoActiveFrog.category(), ErrorCategory::NotFound);
        assert_eq!(
            GameError::Chain(ChainError::TransactionNotFound("sig".into())).category(),
            ErrorCategory::Chain
        );
    }
}
