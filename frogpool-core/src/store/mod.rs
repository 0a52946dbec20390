//! Persistence seam for the game.
//!
//! [`GameStore`] lists every read and write the game needs. [`PgGameStore`]
//! runs them against Postgres through the SQL processors in
//! [`crate::entities`]; [`MemoryGameStore`] keeps everything in process for
//! tests and ephemeral runs.

mod memory;
mod postgres;

pub use memory::MemoryGameStore;
pub use postgres::PgGameStore;

use crate::entities::frog::Frog;
use crate::entities::pool_participant::{PoolMember, PoolParticipant};
use crate::entities::prize_pool::PrizePool;
use crate::entities::user::User;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("activation transaction {0} was already used")]
    DuplicateActivation(String),
}

/// Compare-and-swap write of a frog's hunger.
#[derive(Debug, Clone)]
pub struct HungerWrite {
    pub frog_id: i64,
    pub expected_version: i64,
    pub hunger_level: i32,
    pub last_fed_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub pool_id: i64,
    pub frog_id: i64,
    pub user_id: i64,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    PoolNotFound,
    PoolFull,
    NotCollecting,
    /// The user already sits in a pool that is not completed.
    AlreadyInPool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted {
        pool: PrizePool,
        participant: PoolParticipant,
        /// This admission filled the pool and flipped it to `active`.
        became_active: bool,
    },
    Rejected(AdmissionRejection),
}

#[async_trait::async_trait]
pub trait GameStore: Send + Sync {
    async fn find_or_create_user(&self, wallet_address: &str) -> Result<User, StoreError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    async fn credit_reward(&self, user_id: i64, amount: Decimal)
    -> Result<Option<User>, StoreError>;

    /// Move `amount` from unclaimed to history. Returns `None` when the
    /// unclaimed balance no longer covers `amount`.
    async fn settle_reward_claim(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError>;

    /// Reverse a settlement whose payout failed.
    async fn refund_reward_claim(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError>;

    /// Create a full, active frog. Each activation transaction can be used once.
    async fn create_frog(
        &self,
        user_id: i64,
        activation_tx: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<Frog, StoreError>;

    async fn get_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError>;

    async fn get_active_frog_for_user(&self, user_id: i64) -> Result<Option<Frog>, StoreError>;

    async fn list_active_frogs(&self) -> Result<Vec<Frog>, StoreError>;

    /// Returns `None` when the frog is inactive or its version moved on.
    async fn update_frog_hunger(&self, write: HungerWrite) -> Result<Option<Frog>, StoreError>;

    /// Returns `None` when the frog was already inactive.
    async fn deactivate_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError>;

    /// Deactivate a frog only while it has no seat in a pool that is not
    /// completed. Returns `None` when it is seated or already inactive.
    async fn retire_unseated_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError>;

    async fn create_pool(
        &self,
        prize_amount: Decimal,
        now: time::PrimitiveDateTime,
    ) -> Result<PrizePool, StoreError>;

    async fn get_pool(&self, pool_id: i64) -> Result<Option<PrizePool>, StoreError>;

    async fn find_available_pool(&self, capacity: i32) -> Result<Option<PrizePool>, StoreError>;

    async fn list_active_pools(&self) -> Result<Vec<PrizePool>, StoreError>;

    /// Admit a frog into a pool as one atomic unit.
    ///
    /// Concurrent admissions to the same pool are serialized: the serial
    /// number is `current_players + 1`, the count never exceeds `capacity`,
    /// and the pool turns `active` on the admission that fills it.
    async fn admit_participant(
        &self,
        new: NewParticipant,
        capacity: i32,
        now: time::PrimitiveDateTime,
    ) -> Result<Admission, StoreError>;

    /// Returns `None` when the pool was already completed.
    async fn complete_pool(
        &self,
        pool_id: i64,
        winner: Option<&str>,
        completed_at: time::PrimitiveDateTime,
    ) -> Result<Option<PrizePool>, StoreError>;

    /// Complete an active pool with `holder_address` as winner, provided it
    /// still holds the big prize. Returns `None` otherwise.
    async fn complete_pool_for_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
        completed_at: time::PrimitiveDateTime,
    ) -> Result<Option<PrizePool>, StoreError>;

    /// Returns `None` when the pool is completed or missing.
    async fn set_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<Option<PrizePool>, StoreError>;

    /// Clear the holder if it is still `holder_address`.
    async fn clear_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<Option<PrizePool>, StoreError>;

    /// Members ordered by serial number.
    async fn list_pool_members(&self, pool_id: i64) -> Result<Vec<PoolMember>, StoreError>;

    async fn find_participant(
        &self,
        pool_id: i64,
        frog_id: i64,
    ) -> Result<Option<PoolParticipant>, StoreError>;

    async fn find_open_pool_for_user(&self, user_id: i64)
    -> Result<Option<PrizePool>, StoreError>;
}
