//! Request-triggered game operations.

use super::{GameError, JoinedPool, PoolLifecycleManager, PrizeLocationScheduler};
use crate::chain::ChainGateway;
use crate::config::GameConfig;
use crate::entities::frog::Frog;
use crate::entities::prize_pool::PrizePool;
use crate::entities::user::User;
use crate::entities::PoolStatus;
use crate::registry::ConnectionRegistry;
use crate::store::{GameStore, HungerWrite, StoreError};
use crate::utils::{clamp_hunger, utc_now};
use frogpool_sdk::objects::{ParticipantSnapshot, WsServerMessage};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Feeding retries this often when the decay worker keeps winning the race.
const MAX_FEED_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Activation {
    pub frog: Frog,
    pub joined: JoinedPool,
}

#[derive(Debug, Clone)]
pub struct PlayerProfile {
    pub user: User,
    pub has_active_frog: bool,
}

#[derive(Debug, Clone)]
pub struct RewardClaim {
    pub amount: Decimal,
    pub transaction_hash: String,
}

pub struct GameService {
    store: Arc<dyn GameStore>,
    lifecycle: Arc<PoolLifecycleManager>,
    scheduler: PrizeLocationScheduler,
    registry: Arc<ConnectionRegistry>,
    chain: Arc<dyn ChainGateway>,
    treasury_address: String,
    config: GameConfig,
}

impl GameService {
    pub fn new(
        store: Arc<dyn GameStore>,
        lifecycle: Arc<PoolLifecycleManager>,
        scheduler: PrizeLocationScheduler,
        registry: Arc<ConnectionRegistry>,
        chain: Arc<dyn ChainGateway>,
        treasury_address: String,
    ) -> Self {
        let config = lifecycle.config().clone();
        Self {
            store,
            lifecycle,
            scheduler,
            registry,
            chain,
            treasury_address,
            config,
        }
    }

    /// Resolve the caller's wallet to a user, creating it on first sight.
    pub async fn login(&self, wallet_address: &str) -> Result<User, GameError> {
        Ok(self.store.find_or_create_user(wallet_address).await?)
    }

    /// Turn a verified treasury payment into a frog seated in a pool.
    #[tracing::instrument(skip_all, err, fields(user_id = user.id))]
    pub async fn activate(&self, user: &User, transaction_hash: &str) -> Result<Activation, GameError> {
        let transaction_hash = transaction_hash.trim();
        if transaction_hash.is_empty() {
            return Err(GameError::InvalidInput("transactionHash is required".into()));
        }
        if let Some(pool) = self.store.find_open_pool_for_user(user.id).await? {
            return Err(GameError::AlreadyInPool(pool.id));
        }
        if !self
            .chain
            .verify_payment(transaction_hash, &self.treasury_address)
            .await?
        {
            return Err(GameError::PaymentNotVerified);
        }

        let frog = self.frog_for_activation(user, transaction_hash).await?;
        let joined = match self.join_any_pool(user, &frog).await {
            Ok(joined) => joined,
            Err(e @ GameError::AlreadyInPool(_)) => {
                // A concurrent activation seated the user first.
                self.retire_unseated(&frog).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        info!(
            frog_id = frog.id,
            pool_id = joined.pool.id,
            serial_number = joined.participant.serial_number,
            "Frog activated"
        );
        Ok(Activation { frog, joined })
    }

    /// A new frog for this payment. A retry with the same transaction picks
    /// up the frog the first attempt created.
    async fn frog_for_activation(&self, user: &User, transaction_hash: &str) -> Result<Frog, GameError> {
        let existing = self.store.get_active_frog_for_user(user.id).await?;
        if let Some(frog) = &existing {
            if frog.activation_tx == transaction_hash {
                return Ok(frog.clone());
            }
        }
        let frog = self
            .store
            .create_frog(user.id, transaction_hash, utc_now())
            .await?;
        // A frog left over from an activation that never found a seat. A
        // frog that is seated by now belongs to a concurrent activation and
        // is left alone.
        if let Some(stale) = existing {
            self.retire_unseated(&stale).await;
        }
        Ok(frog)
    }

    async fn retire_unseated(&self, frog: &Frog) {
        match self.store.retire_unseated_frog(frog.id).await {
            Ok(Some(_)) => info!(frog_id = frog.id, "Retired unseated frog"),
            Ok(None) => {}
            Err(e) => warn!(frog_id = frog.id, error = %e, "Failed to retire unseated frog"),
        }
    }

    async fn join_any_pool(&self, user: &User, frog: &Frog) -> Result<JoinedPool, GameError> {
        let attempts = self.config.max_join_attempts.max(1);
        for attempt in 1..=attempts {
            let pool = match self.lifecycle.get_available_pool().await? {
                Some(pool) => pool,
                None => self.lifecycle.create_pool().await?,
            };
            match self
                .lifecycle
                .add_participant(pool.id, frog.id, user.id, &user.wallet_address)
                .await
            {
                Ok(joined) => return Ok(joined),
                Err(GameError::PoolFull(_) | GameError::NotCollecting(_)) => {
                    info!(pool_id = pool.id, attempt, "Lost the race for a seat, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(GameError::JoinFailed(attempts))
    }

    /// Feed the caller's frog. Only the whole part of `pizza_value` counts.
    pub async fn feed(&self, user: &User, pizza_value: f64) -> Result<Frog, GameError> {
        if !pizza_value.is_finite() || pizza_value < 1.0 {
            return Err(GameError::InvalidInput("pizzaValue must be at least 1".into()));
        }
        let amount = pizza_value.trunc().min(i32::MAX as f64) as i64;

        for _ in 0..MAX_FEED_ATTEMPTS {
            let frog = self
                .store
                .get_active_frog_for_user(user.id)
                .await?
                .ok_or(GameError::NoActiveFrog)?;
            let write = HungerWrite {
                frog_id: frog.id,
                expected_version: frog.version,
                hunger_level: clamp_hunger(frog.hunger_level as i64 + amount),
                last_fed_at: utc_now(),
            };
            if let Some(fed) = self.store.update_frog_hunger(write).await? {
                self.registry
                    .send(
                        user.id,
                        WsServerMessage::HungerUpdate {
                            frog_id: fed.id,
                            new_hunger_level: fed.hunger_level,
                        },
                    )
                    .await;
                return Ok(fed);
            }
        }
        Err(GameError::Contended)
    }

    /// Claim the big prize of `pool_id`. Only the current holder may.
    #[tracing::instrument(skip_all, err, fields(user_id = user.id, pool_id = pool_id))]
    pub async fn catch_big_prize(&self, user: &User, pool_id: i64) -> Result<PrizePool, GameError> {
        let frog = self
            .store
            .get_active_frog_for_user(user.id)
            .await?
            .ok_or(GameError::NoActiveFrog)?;
        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(GameError::NotFound {
                entity: "pool",
                id: pool_id,
            })?;
        match pool.status {
            PoolStatus::Active => {}
            PoolStatus::Completed => return Err(GameError::AlreadyCompleted(pool_id)),
            PoolStatus::Collecting => return Err(GameError::PoolNotActive(pool_id)),
        }
        if self.store.find_participant(pool_id, frog.id).await?.is_none() {
            return Err(GameError::NotAParticipant(pool_id));
        }
        if pool.current_big_prize_holder.as_deref() != Some(user.wallet_address.as_str()) {
            return Err(GameError::NotPrizeHolder);
        }

        // The prize task may have moved the prize since the read above.
        let pool = self
            .lifecycle
            .award_big_prize(pool_id, &user.wallet_address)
            .await?;
        self.scheduler.stop(pool_id).await;
        self.settle(&pool, user).await;

        self.registry
            .broadcast_all(&WsServerMessage::GameOver {
                pool_id,
                winner_address: user.wallet_address.clone(),
                prize_amount: pool.prize_amount,
            })
            .await;
        Ok(pool)
    }

    /// Credit the winner and retire every frog of the pool. Each step is
    /// independent; failures are logged and the rest carries on.
    async fn settle(&self, pool: &PrizePool, winner: &User) {
        if let Err(e) = self.store.credit_reward(winner.id, pool.prize_amount).await {
            warn!(pool_id = pool.id, user_id = winner.id, error = %e, "Failed to credit prize");
        }

        let members = match self.store.list_pool_members(pool.id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(pool_id = pool.id, error = %e, "Failed to list members for settlement");
                return;
            }
        };
        for member in members {
            match self.store.deactivate_frog(member.frog_id).await {
                Ok(Some(frog)) => {
                    self.registry
                        .send(
                            frog.user_id,
                            WsServerMessage::HungerUpdate {
                                frog_id: frog.id,
                                new_hunger_level: 0,
                            },
                        )
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(pool_id = pool.id, frog_id = member.frog_id, error = %e, "Failed to retire frog");
                }
            }
        }
    }

    /// The caller's pool that is not completed yet, with its members.
    pub async fn current_pool(
        &self,
        user: &User,
    ) -> Result<Option<(PrizePool, Vec<ParticipantSnapshot>)>, GameError> {
        let Some(pool) = self.store.find_open_pool_for_user(user.id).await? else {
            return Ok(None);
        };
        Ok(Some(self.lifecycle.pool_snapshot(pool.id).await?))
    }

    pub async fn profile(&self, user: &User) -> Result<PlayerProfile, GameError> {
        let user = self
            .store
            .get_user(user.id)
            .await?
            .ok_or(GameError::NotFound {
                entity: "user",
                id: user.id,
            })?;
        let has_active_frog = self.store.get_active_frog_for_user(user.id).await?.is_some();
        Ok(PlayerProfile {
            user,
            has_active_frog,
        })
    }

    /// Pay out the whole unclaimed balance with a transaction the caller
    /// signed.
    ///
    /// The balance is moved to history before the transaction is sent and
    /// moved back if sending fails.
    #[tracing::instrument(skip_all, err, fields(user_id = user.id))]
    pub async fn submit_reward_claim(
        &self,
        user: &User,
        signed_transaction: &str,
        amount: Decimal,
    ) -> Result<RewardClaim, GameError> {
        if signed_transaction.trim().is_empty() {
            return Err(GameError::InvalidInput("signedTransaction is required".into()));
        }
        let current = self
            .store
            .get_user(user.id)
            .await?
            .ok_or(GameError::NotFound {
                entity: "user",
                id: user.id,
            })?;
        if current.unclaimed_rewards <= Decimal::ZERO {
            return Err(GameError::NothingToClaim);
        }
        if amount != current.unclaimed_rewards {
            return Err(GameError::ClaimAmountMismatch);
        }
        if self
            .store
            .settle_reward_claim(user.id, amount)
            .await?
            .is_none()
        {
            return Err(GameError::ClaimAmountMismatch);
        }

        match self.chain.submit(signed_transaction.trim()).await {
            Ok(transaction_hash) => {
                info!(%amount, %transaction_hash, "Reward claim paid out");
                Ok(RewardClaim {
                    amount,
                    transaction_hash,
                })
            }
            Err(e) => {
                if let Err(refund) = self.refund(user.id, amount).await {
                    warn!(%amount, error = %refund, "Failed to refund reward claim");
                }
                Err(e.into())
            }
        }
    }

    async fn refund(&self, user_id: i64, amount: Decimal) -> Result<(), StoreError> {
        self.store.refund_reward_claim(user_id, amount).await?;
        Ok(())
    }
}
