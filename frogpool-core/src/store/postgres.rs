use super::{Admission, AdmissionRejection, GameStore, HungerWrite, NewParticipant, StoreError};
use crate::config::MAX_HUNGER_LEVEL;
use crate::entities::PoolStatus;
use crate::entities::frog::{
    CreateFrog, DeactivateFrog, Frog, GetActiveFrogByUser, GetFrogById, ListActiveFrogs,
    RetireUnseatedFrog, UpdateFrogHunger,
};
use crate::entities::pool_participant::{
    FindParticipant, InsertParticipant, ListPoolMembers, PoolMember, PoolParticipant,
};
use crate::entities::prize_pool::{
    ClearBigPrizeHolder, CompletePool, CompletePoolForHolder, CreatePool, FindAvailablePool,
    FindOpenPoolForUser, GetPoolById, ListActivePools, PrizePool, SetBigPrizeHolder,
};
use crate::entities::user::{
    CreditUserReward, FindOrCreateUser, GetUserById, RefundUserRewardClaim,
    SettleUserRewardClaim, User,
};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

/// [`GameStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgGameStore {
    db: DatabaseProcessor,
}

impl PgGameStore {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[async_trait::async_trait]
impl GameStore for PgGameStore {
    async fn find_or_create_user(&self, wallet_address: &str) -> Result<User, StoreError> {
        Ok(self
            .db
            .process(FindOrCreateUser {
                wallet_address: wallet_address.to_owned(),
            })
            .await?)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.db.process(GetUserById { user_id }).await?)
    }

    async fn credit_reward(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.db.process(CreditUserReward { user_id, amount }).await?)
    }

    async fn settle_reward_claim(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .db
            .process(SettleUserRewardClaim { user_id, amount })
            .await?)
    }

    async fn refund_reward_claim(
        &self,
        user_id: i64,
        amount: Decimal,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .db
            .process(RefundUserRewardClaim { user_id, amount })
            .await?)
    }

    async fn create_frog(
        &self,
        user_id: i64,
        activation_tx: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<Frog, StoreError> {
        self.db
            .process(CreateFrog {
                user_id,
                activation_tx: activation_tx.to_owned(),
                hunger_level: MAX_HUNGER_LEVEL,
                now,
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateActivation(activation_tx.to_owned())
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn get_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError> {
        Ok(self.db.process(GetFrogById { frog_id }).await?)
    }

    async fn get_active_frog_for_user(&self, user_id: i64) -> Result<Option<Frog>, StoreError> {
        Ok(self.db.process(GetActiveFrogByUser { user_id }).await?)
    }

    async fn list_active_frogs(&self) -> Result<Vec<Frog>, StoreError> {
        Ok(self.db.process(ListActiveFrogs).await?)
    }

    async fn update_frog_hunger(&self, write: HungerWrite) -> Result<Option<Frog>, StoreError> {
        Ok(self
            .db
            .process(UpdateFrogHunger {
                frog_id: write.frog_id,
                expected_version: write.expected_version,
                hunger_level: write.hunger_level,
                last_fed_at: write.last_fed_at,
            })
            .await?)
    }

    async fn deactivate_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError> {
        Ok(self.db.process(DeactivateFrog { frog_id }).await?)
    }

    async fn retire_unseated_frog(&self, frog_id: i64) -> Result<Option<Frog>, StoreError> {
        Ok(self.db.process(RetireUnseatedFrog { frog_id }).await?)
    }

    async fn create_pool(
        &self,
        prize_amount: Decimal,
        now: time::PrimitiveDateTime,
    ) -> Result<PrizePool, StoreError> {
        Ok(self.db.process(CreatePool { prize_amount, now }).await?)
    }

    async fn get_pool(&self, pool_id: i64) -> Result<Option<PrizePool>, StoreError> {
        Ok(self.db.process(GetPoolById { pool_id }).await?)
    }

    async fn find_available_pool(&self, capacity: i32) -> Result<Option<PrizePool>, StoreError> {
        Ok(self.db.process(FindAvailablePool { capacity }).await?)
    }

    async fn list_active_pools(&self) -> Result<Vec<PrizePool>, StoreError> {
        Ok(self.db.process(ListActivePools).await?)
    }

    #[tracing::instrument(skip_all, err, fields(pool_id = new.pool_id, frog_id = new.frog_id))]
    async fn admit_participant(
        &self,
        new: NewParticipant,
        capacity: i32,
        now: time::PrimitiveDateTime,
    ) -> Result<Admission, StoreError> {
        let mut tx = self.db.begin().await?;

        // Lock order is always user then pool.
        User::lock_for_update_tx(&mut tx, new.user_id).await?;
        if PoolParticipant::user_has_open_membership_tx(&mut tx, new.user_id).await? {
            tx.rollback().await?;
            return Ok(Admission::Rejected(AdmissionRejection::AlreadyInPool));
        }

        let Some(pool) = PrizePool::lock_for_update_tx(&mut tx, new.pool_id).await? else {
            tx.rollback().await?;
            return Ok(Admission::Rejected(AdmissionRejection::PoolNotFound));
        };
        if pool.status != PoolStatus::Collecting {
            tx.rollback().await?;
            return Ok(Admission::Rejected(AdmissionRejection::NotCollecting));
        }
        if pool.current_players >= capacity {
            tx.rollback().await?;
            return Ok(Admission::Rejected(AdmissionRejection::PoolFull));
        }

        let serial_number = pool.current_players + 1;
        let participant = PoolParticipant::insert_tx(
            &mut tx,
            InsertParticipant {
                pool_id: new.pool_id,
                frog_id: new.frog_id,
                user_id: new.user_id,
                wallet_address: new.wallet_address,
                serial_number,
                joined_at: now,
            },
        )
        .await?;
        let became_active = serial_number == capacity;
        let pool =
            PrizePool::record_admission_tx(&mut tx, new.pool_id, serial_number, became_active)
                .await?;
        tx.commit().await?;

        Ok(Admission::Admitted {
            pool,
            participant,
            became_active,
        })
    }

    async fn complete_pool(
        &self,
        pool_id: i64,
        winner: Option<&str>,
        completed_at: time::PrimitiveDateTime,
    ) -> Result<Option<PrizePool>, StoreError> {
        Ok(self
            .db
            .process(CompletePool {
                pool_id,
                winner: winner.map(str::to_owned),
                completed_at,
            })
            .await?)
    }

    async fn complete_pool_for_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
        completed_at: time::PrimitiveDateTime,
    ) -> Result<Option<PrizePool>, StoreError> {
        Ok(self
            .db
            .process(CompletePoolForHolder {
                pool_id,
                holder_address: holder_address.to_owned(),
                completed_at,
            })
            .await?)
    }

    async fn set_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<Option<PrizePool>, StoreError> {
        Ok(self
            .db
            .process(SetBigPrizeHolder {
                pool_id,
                holder_address: holder_address.to_owned(),
            })
            .await?)
    }

    async fn clear_prize_holder(
        &self,
        pool_id: i64,
        holder_address: &str,
    ) -> Result<Option<PrizePool>, StoreError> {
        Ok(self
            .db
            .process(ClearBigPrizeHolder {
                pool_id,
                holder_address: holder_address.to_owned(),
            })
            .await?)
    }

    async fn list_pool_members(&self, pool_id: i64) -> Result<Vec<PoolMember>, StoreError> {
        Ok(self.db.process(ListPoolMembers { pool_id }).await?)
    }

    async fn find_participant(
        &self,
        pool_id: i64,
        frog_id: i64,
    ) -> Result<Option<PoolParticipant>, StoreError> {
        Ok(self.db.process(FindParticipant { pool_id, frog_id }).await?)
    }

    async fn find_open_pool_for_user(
        &self,
        user_id: i64,
    ) -> Result<Option<PrizePool>, StoreError> {
        Ok(self.db.process(FindOpenPoolForUser { user_id }).await?)
    }
}
