use crate::entities::PoolStatus;
use crate::framework::{DatabaseProcessor, PgTransaction};
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PrizePool {
    pub id: i64,
    pub status: PoolStatus,
    pub current_players: i32,
    pub prize_amount: Decimal,
    /// Wallet that won the big prize. Stays empty after an extinction.
    pub big_prize_winner: Option<String>,
    /// Wallet that can currently see the big prize.
    pub current_big_prize_holder: Option<String>,
    pub created_at: time::PrimitiveDateTime,
    pub completed_at: Option<time::PrimitiveDateTime>,
}

const POOL_COLUMNS: &str = "id, status, current_players, prize_amount, big_prize_winner, \
     current_big_prize_holder, created_at, completed_at";

#[derive(Debug, Clone)]
pub struct CreatePool {
    pub prize_amount: Decimal,
    pub now: time::PrimitiveDateTime,
}

impl Processor<CreatePool> for DatabaseProcessor {
    type Output = PrizePool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreatePool")]
    async fn process(&self, cmd: CreatePool) -> Result<PrizePool, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            INSERT INTO prize_pools (status, current_players, prize_amount, created_at)
            VALUES ('collecting', 0, $1, $2)
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(cmd.prize_amount)
        .bind(cmd.now)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetPoolById {
    pub pool_id: i64,
}

impl Processor<GetPoolById> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPoolById")]
    async fn process(&self, query: GetPoolById) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            "SELECT {POOL_COLUMNS} FROM prize_pools WHERE id = $1"
        ))
        .bind(query.pool_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// The oldest collecting pool that still has a free seat.
pub struct FindAvailablePool {
    pub capacity: i32,
}

impl Processor<FindAvailablePool> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindAvailablePool")]
    async fn process(&self, query: FindAvailablePool) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            SELECT {POOL_COLUMNS}
            FROM prize_pools
            WHERE status = 'collecting' AND current_players < $1
            ORDER BY id
            LIMIT 1
            "#
        ))
        .bind(query.capacity)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct ListActivePools;

impl Processor<ListActivePools> for DatabaseProcessor {
    type Output = Vec<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListActivePools")]
    async fn process(&self, _query: ListActivePools) -> Result<Vec<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            "SELECT {POOL_COLUMNS} FROM prize_pools WHERE status = 'active' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Mark a pool completed. Returns `None` if it already was.
pub struct CompletePool {
    pub pool_id: i64,
    pub winner: Option<String>,
    pub completed_at: time::PrimitiveDateTime,
}

impl Processor<CompletePool> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CompletePool")]
    async fn process(&self, cmd: CompletePool) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            UPDATE prize_pools
            SET status = 'completed', big_prize_winner = $2, completed_at = $3
            WHERE id = $1 AND status <> 'completed'
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(cmd.pool_id)
        .bind(cmd.winner)
        .bind(cmd.completed_at)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Complete an active pool in favour of the player who holds the big prize
/// right now. Returns `None` if the pool is not active or the prize has
/// moved to someone else.
pub struct CompletePoolForHolder {
    pub pool_id: i64,
    pub holder_address: String,
    pub completed_at: time::PrimitiveDateTime,
}

impl Processor<CompletePoolForHolder> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CompletePoolForHolder")]
    async fn process(&self, cmd: CompletePoolForHolder) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            UPDATE prize_pools
            SET status = 'completed', big_prize_winner = $2, completed_at = $3
            WHERE id = $1 AND status = 'active' AND current_big_prize_holder = $2
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(cmd.pool_id)
        .bind(cmd.holder_address)
        .bind(cmd.completed_at)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Drop the big prize marker if `holder_address` still has it.
pub struct ClearBigPrizeHolder {
    pub pool_id: i64,
    pub holder_address: String,
}

impl Processor<ClearBigPrizeHolder> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClearBigPrizeHolder")]
    async fn process(&self, cmd: ClearBigPrizeHolder) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            UPDATE prize_pools
            SET current_big_prize_holder = NULL
            WHERE id = $1 AND status <> 'completed' AND current_big_prize_holder = $2
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(cmd.pool_id)
        .bind(cmd.holder_address)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Move the big prize. Returns `None` if the pool is already completed.
pub struct SetBigPrizeHolder {
    pub pool_id: i64,
    pub holder_address: String,
}

impl Processor<SetBigPrizeHolder> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetBigPrizeHolder")]
    async fn process(&self, cmd: SetBigPrizeHolder) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            UPDATE prize_pools
            SET current_big_prize_holder = $2
            WHERE id = $1 AND status <> 'completed'
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(cmd.pool_id)
        .bind(cmd.holder_address)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// The most recent pool the user joined that is not completed yet.
pub struct FindOpenPoolForUser {
    pub user_id: i64,
}

impl Processor<FindOpenPoolForUser> for DatabaseProcessor {
    type Output = Option<PrizePool>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindOpenPoolForUser")]
    async fn process(&self, query: FindOpenPoolForUser) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(
            r#"
            SELECT p.id, p.status, p.current_players, p.prize_amount, p.big_prize_winner,
                   p.current_big_prize_holder, p.created_at, p.completed_at
            FROM prize_pools p
            JOIN pool_participants pp ON pp.pool_id = p.id
            WHERE pp.user_id = $1 AND p.status <> 'completed'
            ORDER BY p.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

impl PrizePool {
    /// Read the pool and hold its row lock until the transaction ends.
    pub async fn lock_for_update_tx(
        tx: &mut PgTransaction<'_>,
        pool_id: i64,
    ) -> Result<Option<PrizePool>, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            "SELECT {POOL_COLUMNS} FROM prize_pools WHERE id = $1 FOR UPDATE"
        ))
        .bind(pool_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Store the new player count, flipping to `active` when `activate` is set.
    pub async fn record_admission_tx(
        tx: &mut PgTransaction<'_>,
        pool_id: i64,
        current_players: i32,
        activate: bool,
    ) -> Result<PrizePool, sqlx::Error> {
        sqlx::query_as::<_, PrizePool>(&format!(
            r#"
            UPDATE prize_pools
            SET current_players = $2,
                status = CASE WHEN $3 THEN 'active'::pool_status ELSE status END
            WHERE id = $1
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(pool_id)
        .bind(current_players)
        .bind(activate)
        .fetch_one(&mut **tx)
        .await
    }
}
