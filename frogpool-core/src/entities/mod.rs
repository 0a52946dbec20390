pub mod frog;
pub mod pool_participant;
pub mod prize_pool;
pub mod user;

use frogpool_sdk::objects::PoolStatus as SdkPoolStatus;

/// Pool status for database operations.
///
/// Transitions only move forward: `Collecting -> Active -> Completed`.
///
/// This is the sqlx::Type version. For API/DTO use, see `frogpool_sdk::objects::PoolStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "pool_status")]
pub enum PoolStatus {
    Collecting,
    Active,
    Completed,
}

impl PoolStatus {
    /// Whether the pool still counts as the user's current game.
    pub fn is_open(self) -> bool {
        !matches!(self, PoolStatus::Completed)
    }
}

impl From<PoolStatus> for SdkPoolStatus {
    fn from(value: PoolStatus) -> Self {
        match value {
            PoolStatus::Collecting => SdkPoolStatus::Collecting,
            PoolStatus::Active => SdkPoolStatus::Active,
            PoolStatus::Completed => SdkPoolStatus::Completed,
        }
    }
}

impl From<SdkPoolStatus> for PoolStatus {
    fn from(value: SdkPoolStatus) -> Self {
        match value {
            SdkPoolStatus::Collecting => PoolStatus::Collecting,
            SdkPoolStatus::Active => PoolStatus::Active,
            SdkPoolStatus::Completed => PoolStatus::Completed,
        }
    }
}
