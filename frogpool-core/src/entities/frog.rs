use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// A player's frog for one game.
///
/// `is_active` flips to `false` exactly once, when hunger hits zero or the
/// pool the frog played in is settled. A new game always gets a new frog.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Frog {
    pub id: i64,
    pub user_id: i64,
    pub hunger_level: i32,
    pub is_active: bool,
    pub last_fed_at: time::PrimitiveDateTime,
    /// Signature of the payment that activated this frog.
    pub activation_tx: String,
    /// Bumped on every write; used for compare-and-swap updates.
    pub version: i64,
    pub created_at: time::PrimitiveDateTime,
}

const FROG_COLUMNS: &str =
    "id, user_id, hunger_level, is_active, last_fed_at, activation_tx, version, created_at";

#[derive(Debug, Clone)]
pub struct CreateFrog {
    pub user_id: i64,
    pub activation_tx: String,
    pub hunger_level: i32,
    pub now: time::PrimitiveDateTime,
}

impl Processor<CreateFrog> for DatabaseProcessor {
    type Output = Frog;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateFrog")]
    async fn process(&self, cmd: CreateFrog) -> Result<Frog, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!(
            r#"
            INSERT INTO frogs (user_id, hunger_level, is_active, last_fed_at, activation_tx, created_at)
            VALUES ($1, $2, true, $3, $4, $3)
            RETURNING {FROG_COLUMNS}
            "#
        ))
        .bind(cmd.user_id)
        .bind(cmd.hunger_level)
        .bind(cmd.now)
        .bind(cmd.activation_tx)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetFrogById {
    pub frog_id: i64,
}

impl Processor<GetFrogById> for DatabaseProcessor {
    type Output = Option<Frog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetFrogById")]
    async fn process(&self, query: GetFrogById) -> Result<Option<Frog>, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!("SELECT {FROG_COLUMNS} FROM frogs WHERE id = $1"))
            .bind(query.frog_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// The user's living frog, if any. The newest one wins should there be
/// more than one.
pub struct GetActiveFrogByUser {
    pub user_id: i64,
}

impl Processor<GetActiveFrogByUser> for DatabaseProcessor {
    type Output = Option<Frog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetActiveFrogByUser")]
    async fn process(&self, query: GetActiveFrogByUser) -> Result<Option<Frog>, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!(
            r#"
            SELECT {FROG_COLUMNS}
            FROM frogs
            WHERE user_id = $1 AND is_active = true
            ORDER BY id DESC
            LIMIT 1
            "#
        ))
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct ListActiveFrogs;

impl Processor<ListActiveFrogs> for DatabaseProcessor {
    type Output = Vec<Frog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListActiveFrogs")]
    async fn process(&self, _query: ListActiveFrogs) -> Result<Vec<Frog>, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!(
            "SELECT {FROG_COLUMNS} FROM frogs WHERE is_active = true ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Compare-and-swap hunger write.
///
/// Applies only when the frog is still active and still at
/// `expected_version`. A level of zero deactivates the frog in the same
/// statement. Returns `None` when another writer got there first.
pub struct UpdateFrogHunger {
    pub frog_id: i64,
    pub expected_version: i64,
    pub hunger_level: i32,
    pub last_fed_at: time::PrimitiveDateTime,
}

impl Processor<UpdateFrogHunger> for DatabaseProcessor {
    type Output = Option<Frog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateFrogHunger")]
    async fn process(&self, cmd: UpdateFrogHunger) -> Result<Option<Frog>, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!(
            r#"
            UPDATE frogs
            SET hunger_level = $3,
                last_fed_at = $4,
                is_active = $3 > 0,
                version = version + 1
            WHERE id = $1 AND version = $2 AND is_active = true
            RETURNING {FROG_COLUMNS}
            "#
        ))
        .bind(cmd.frog_id)
        .bind(cmd.expected_version)
        .bind(cmd.hunger_level)
        .bind(cmd.last_fed_at)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Zero out and deactivate a frog. Returns `None` if it was already inactive.
pub struct DeactivateFrog {
    pub frog_id: i64,
}

impl Processor<DeactivateFrog> for DatabaseProcessor {
    type Output = Option<Frog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeactivateFrog")]
    async fn process(&self, cmd: DeactivateFrog) -> Result<Option<Frog>, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!(
            r#"
            UPDATE frogs
            SET hunger_level = 0, is_active = false, version = version + 1
            WHERE id = $1 AND is_active = true
            RETURNING {FROG_COLUMNS}
            "#
        ))
        .bind(cmd.frog_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Deactivate a frog that holds no seat in a pool that is still running.
/// Returns `None` if the frog is seated or already inactive.
pub struct RetireUnseatedFrog {
    pub frog_id: i64,
}

impl Processor<RetireUnseatedFrog> for DatabaseProcessor {
    type Output = Option<Frog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RetireUnseatedFrog")]
    async fn process(&self, cmd: RetireUnseatedFrog) -> Result<Option<Frog>, sqlx::Error> {
        sqlx::query_as::<_, Frog>(&format!(
            r#"
            UPDATE frogs
            SET hunger_level = 0, is_active = false, version = version + 1
            WHERE id = $1
              AND is_active = true
              AND NOT EXISTS (
                  SELECT 1
                  FROM pool_participants pp
                  JOIN prize_pools p ON p.id = pp.pool_id
                  WHERE pp.frog_id = $1 AND p.status <> 'completed'
              )
            RETURNING {FROG_COLUMNS}
            "#
        ))
        .bind(cmd.frog_id)
        .fetch_optional(&self.pool)
        .await
    }
}
