//! Repository for the `api_requests` table.

use sqlx::PgPool;
use housing_core::types::Timestamp;

use crate::models::api_request::{ApiRequestLog, CreateApiRequestLog};

const COLUMNS: &str = "\
    id, request_id, endpoint, method, status_code, \
    response_time_ms, error_message, created_at";

const INSERT_COLUMNS: &str = "\
    request_id, endpoint, method, status_code, response_time_ms, error_message";

/// Provides query operations for the request log.
pub struct ApiRequestRepo;

impl ApiRequestRepo {
    pub async fn insert(
        pool: &PgPool,
        log: &CreateApiRequestLog,
    ) -> Result<ApiRequestLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_requests ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApiRequestLog>(&query)
            .bind(&log.request_id)
            .bind(&log.endpoint)
            .bind(&log.method)
            .bind(log.status_code)
            .bind(log.response_time_ms)
            .bind(&log.error_message)
            .fetch_one(pool)
            .await
    }

    /// Total logged requests.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_requests")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Delete rows logged before `cutoff`. Returns the number removed.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM api_requests WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
