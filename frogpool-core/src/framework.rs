use sqlx::PgPool;

/// Executes the SQL query objects declared in [`crate::entities`].
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    /// Begin a transaction for multi-statement writes.
    pub async fn begin(&self) -> Result<PgTransaction<'static>, sqlx::Error> {
        self.pool.begin().await
    }
}

/// An open Postgres transaction.
pub type PgTransaction<'b> = sqlx::Transaction<'b, sqlx::Postgres>;
