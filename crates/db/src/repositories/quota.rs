use chrono::{NaiveDate, Utc};

use super::{QuotaDecision, QuotaRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuotaRepository {
    pool: DbPool,
}

impl SqlQuotaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuotaRepository for SqlQuotaRepository {
    async fn check_and_consume(
        &self,
        user_id: &str,
        daily_limit: u32,
        day: NaiveDate,
    ) -> Result<QuotaDecision, RepositoryError> {
        if daily_limit == 0 {
            return Ok(QuotaDecision::Exhausted);
        }

        // Single statement so concurrent requests cannot both take the last slot.
        let used: Option<i64> = sqlx::query_scalar(
            "INSERT INTO chat_usage (user_id, usage_day, used, updated_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT(user_id, usage_day) DO UPDATE SET
                used = chat_usage.used + 1,
                updated_at = excluded.updated_at
             WHERE chat_usage.used < ?
             RETURNING used",
        )
        .bind(user_id)
        .bind(day.format("%Y-%m-%d").to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(i64::from(daily_limit))
        .fetch_optional(&self.pool)
        .await?;

        Ok(match used {
            Some(used) => QuotaDecision::from_sentinel(i64::from(daily_limit) - used),
            None => QuotaDecision::Exhausted,
        })
    }
}
