use crate::framework::{DatabaseProcessor, PgTransaction};
use frogpool_sdk::objects::ParticipantSnapshot;
use kanau::processor::Processor;

/// Membership of a frog in a pool.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PoolParticipant {
    pub id: i64,
    pub pool_id: i64,
    pub frog_id: i64,
    pub user_id: i64,
    pub wallet_address: String,
    /// 1-based join order, unique within the pool.
    pub serial_number: i32,
    pub joined_at: time::PrimitiveDateTime,
}

/// A membership joined with the current state of its frog.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PoolMember {
    pub participant_id: i64,
    pub pool_id: i64,
    pub frog_id: i64,
    pub user_id: i64,
    pub wallet_address: String,
    pub serial_number: i32,
    pub frog_active: bool,
    pub hunger_level: i32,
}

impl PoolMember {
    /// Public view of the member given the pool's current prize holder.
    pub fn snapshot(&self, holder_address: Option<&str>) -> ParticipantSnapshot {
        ParticipantSnapshot {
            wallet_address: self.wallet_address.clone(),
            serial_number: self.serial_number,
            can_see_big_prize: holder_address == Some(self.wallet_address.as_str()),
            is_active: self.frog_active,
        }
    }
}

/// Snapshots of all `members`, keeping their order.
pub fn member_snapshots(
    members: &[PoolMember],
    holder_address: Option<&str>,
) -> Vec<ParticipantSnapshot> {
    members.iter().map(|m| m.snapshot(holder_address)).collect()
}

const PARTICIPANT_COLUMNS: &str =
    "id, pool_id, frog_id, user_id, wallet_address, serial_number, joined_at";

#[derive(Debug, Clone)]
/// Members of a pool ordered by serial number.
pub struct ListPoolMembers {
    pub pool_id: i64,
}

impl Processor<ListPoolMembers> for DatabaseProcessor {
    type Output = Vec<PoolMember>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPoolMembers")]
    async fn process(&self, query: ListPoolMembers) -> Result<Vec<PoolMember>, sqlx::Error> {
        sqlx::query_as::<_, PoolMember>(
            r#"
            SELECT pp.id AS participant_id, pp.pool_id, pp.frog_id, pp.user_id,
                   pp.wallet_address, pp.serial_number,
                   f.is_active AS frog_active, f.hunger_level
            FROM pool_participants pp
            JOIN frogs f ON f.id = pp.frog_id
            WHERE pp.pool_id = $1
            ORDER BY pp.serial_number
            "#,
        )
        .bind(query.pool_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct FindParticipant {
    pub pool_id: i64,
    pub frog_id: i64,
}

impl Processor<FindParticipant> for DatabaseProcessor {
    type Output = Option<PoolParticipant>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindParticipant")]
    async fn process(&self, query: FindParticipant) -> Result<Option<PoolParticipant>, sqlx::Error> {
        sqlx::query_as::<_, PoolParticipant>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM pool_participants WHERE pool_id = $1 AND frog_id = $2"
        ))
        .bind(query.pool_id)
        .bind(query.frog_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct InsertParticipant {
    pub pool_id: i64,
    pub frog_id: i64,
    pub user_id: i64,
    pub wallet_address: String,
    pub serial_number: i32,
    pub joined_at: time::PrimitiveDateTime,
}

impl PoolParticipant {
    pub async fn insert_tx(
        tx: &mut PgTransaction<'_>,
        row: InsertParticipant,
    ) -> Result<PoolParticipant, sqlx::Error> {
        sqlx::query_as::<_, PoolParticipant>(&format!(
            r#"
            INSERT INTO pool_participants (pool_id, frog_id, user_id, wallet_address, serial_number, joined_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        ))
        .bind(row.pool_id)
        .bind(row.frog_id)
        .bind(row.user_id)
        .bind(row.wallet_address)
        .bind(row.serial_number)
        .bind(row.joined_at)
        .fetch_one(&mut **tx)
        .await
    }

    /// Whether the user already sits in a pool that is not completed.
    pub async fn user_has_open_membership_tx(
        tx: &mut PgTransaction<'_>,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM pool_participants pp
                JOIN prize_pools p ON p.id = pp.pool_id
                WHERE pp.user_id = $1 AND p.status <> 'completed'
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }
}
