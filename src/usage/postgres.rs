use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::{PlannerError, Result};
use crate::types::usage::UsageRecord;

use super::store::{IncrementOutcome, UsageStore};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, sqlx::FromRow)]
struct UsageRow {
    user_id: String,
    year: i32,
    count: i32,
    usage_limit: i32,
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = PlannerError;

    fn try_from(row: UsageRow) -> Result<Self> {
        let count = u32::try_from(row.count)
            .map_err(|_| PlannerError::Accounting(format!("negative usage count {}", row.count)))?;
        let limit = u32::try_from(row.usage_limit).map_err(|_| {
            PlannerError::Accounting(format!("negative usage limit {}", row.usage_limit))
        })?;

        Ok(UsageRecord {
            user_id: row.user_id,
            year: row.year,
            count,
            limit,
        })
    }
}

fn to_db_limit(limit: u32) -> Result<i32> {
    i32::try_from(limit)
        .map_err(|_| PlannerError::InvalidRequest(format!("usage limit {limit} is too large")))
}

/// Usage store backed by the `user_usage` table.
#[derive(Debug, Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| PlannerError::Accounting(format!("migration failed: {err}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    #[tracing::instrument(skip(self))]
    async fn try_increment(
        &self,
        user_id: &str,
        year: i32,
        default_limit: u32,
    ) -> Result<IncrementOutcome> {
        // Insert-or-increment in one statement; the WHERE on the conflict
        // branch suppresses the update (and the returned row) at the limit.
        let incremented = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO user_usage (user_id, year, count, usage_limit)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (user_id, year) DO UPDATE
            SET count = user_usage.count + 1, updated_at = now()
            WHERE user_usage.count < user_usage.usage_limit
            RETURNING user_id, year, count, usage_limit
            "#,
        )
        .bind(user_id)
        .bind(year)
        .bind(to_db_limit(default_limit)?)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = incremented {
            return Ok(IncrementOutcome::Incremented(row.try_into()?));
        }

        let current = self.fetch(user_id, year).await?.ok_or_else(|| {
            PlannerError::Accounting(format!("usage record for {user_id}/{year} vanished"))
        })?;
        Ok(IncrementOutcome::LimitReached(current))
    }

    #[tracing::instrument(skip(self))]
    async fn decrement(&self, user_id: &str, year: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_usage
            SET count = GREATEST(count - 1, 0), updated_at = now()
            WHERE user_id = $1 AND year = $2
            "#,
        )
        .bind(user_id)
        .bind(year)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch(&self, user_id: &str, year: i32) -> Result<Option<UsageRecord>> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT user_id, year, count, usage_limit
            FROM user_usage
            WHERE user_id = $1 AND year = $2
            "#,
        )
        .bind(user_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UsageRecord::try_from).transpose()
    }

    async fn get_or_create(
        &self,
        user_id: &str,
        year: i32,
        default_limit: u32,
    ) -> Result<UsageRecord> {
        // The no-op update makes RETURNING yield the existing row.
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO user_usage (user_id, year, count, usage_limit)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id, year) DO UPDATE
            SET user_id = EXCLUDED.user_id
            RETURNING user_id, year, count, usage_limit
            "#,
        )
        .bind(user_id)
        .bind(year)
        .bind(to_db_limit(default_limit)?)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self))]
    async fn set_limit(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO user_usage (user_id, year, count, usage_limit)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id, year) DO UPDATE
            SET usage_limit = EXCLUDED.usage_limit, updated_at = now()
            RETURNING user_id, year, count, usage_limit
            "#,
        )
        .bind(user_id)
        .bind(year)
        .bind(to_db_limit(limit)?)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self))]
    async fn reset(&self, user_id: &str, year: i32, limit: u32) -> Result<UsageRecord> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO user_usage (user_id, year, count, usage_limit)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id, year) DO UPDATE
            SET count = 0, usage_limit = EXCLUDED.usage_limit, updated_at = now()
            RETURNING user_id, year, count, usage_limit
            "#,
        )
        .bind(user_id)
        .bind(year)
        .bind(to_db_limit(limit)?)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}
