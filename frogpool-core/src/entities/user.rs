use crate::framework::{DatabaseProcessor, PgTransaction};
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub wallet_address: String,
    pub unclaimed_rewards: Decimal,
    pub history_rewards: Decimal,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone)]
/// Look up a user by wallet, inserting a fresh row on first sight.
pub struct FindOrCreateUser {
    pub wallet_address: String,
}

impl Processor<FindOrCreateUser> for DatabaseProcessor {
    type Output = User;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindOrCreateUser")]
    async fn process(&self, query: FindOrCreateUser) -> Result<User, sqlx::Error> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (wallet_address)
            VALUES ($1)
            ON CONFLICT (wallet_address) DO UPDATE SET wallet_address = EXCLUDED.wallet_address
            RETURNING id, wallet_address, unclaimed_rewards, history_rewards, created_at
            "#,
        )
        .bind(query.wallet_address)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetUserById {
    pub user_id: i64,
}

impl Processor<GetUserById> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserById")]
    async fn process(&self, query: GetUserById) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, wallet_address, unclaimed_rewards, history_rewards, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Add a won prize to the user's unclaimed balance.
pub struct CreditUserReward {
    pub user_id: i64,
    pub amount: Decimal,
}

impl Processor<CreditUserReward> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreditUserReward")]
    async fn process(&self, cmd: CreditUserReward) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET unclaimed_rewards = unclaimed_rewards + $2
            WHERE id = $1
            RETURNING id, wallet_address, unclaimed_rewards, history_rewards, created_at
            "#,
        )
        .bind(cmd.user_id)
        .bind(cmd.amount)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Move `amount` from the unclaimed balance to history ahead of a payout.
///
/// Only matches while the unclaimed balance still covers `amount`, so two
/// concurrent claims cannot both reserve the same funds.
pub struct SettleUserRewardClaim {
    pub user_id: i64,
    pub amount: Decimal,
}

impl Processor<SettleUserRewardClaim> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SettleUserRewardClaim")]
    async fn process(&self, cmd: SettleUserRewardClaim) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET unclaimed_rewards = unclaimed_rewards - $2,
                history_rewards = history_rewards + $2
            WHERE id = $1 AND unclaimed_rewards >= $2
            RETURNING id, wallet_address, unclaimed_rewards, history_rewards, created_at
            "#,
        )
        .bind(cmd.user_id)
        .bind(cmd.amount)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Undo a [`SettleUserRewardClaim`] whose payout never reached the chain.
pub struct RefundUserRewardClaim {
    pub user_id: i64,
    pub amount: Decimal,
}

impl Processor<RefundUserRewardClaim> for DatabaseProcessor {
    type Output = Option<User>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RefundUserRewardClaim")]
    async fn process(&self, cmd: RefundUserRewardClaim) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET unclaimed_rewards = unclaimed_rewards + $2,
                history_rewards = history_rewards - $2
            WHERE id = $1
            RETURNING id, wallet_address, unclaimed_rewards, history_rewards, created_at
            "#,
        )
        .bind(cmd.user_id)
        .bind(cmd.amount)
        .fetch_optional(&self.pool)
        .await
    }
}

impl User {
    /// Lock the user row for the rest of the transaction.
    ///
    /// Serializes concurrent activations of the same user.
    pub async fn lock_for_update_tx(
        tx: &mut PgTransaction<'_>,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(locked.is_some())
    }
}
