//! Repository for the `predictions` table (append-only log).

use sqlx::PgPool;
use housing_core::types::Timestamp;

use crate::models::prediction::{CreatePredictionLog, PredictionLog, RecentPrediction};

/// Column list for `predictions` SELECT queries.
const COLUMNS: &str = "\
    id, input_data, prediction, confidence, response_time_ms, \
    model_used, endpoint, error_message, created_at";

/// Column list for `predictions` INSERT statements (excludes `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    input_data, prediction, confidence, response_time_ms, \
    model_used, endpoint, error_message";

/// Provides query operations for the prediction log.
pub struct PredictionLogRepo;

impl PredictionLogRepo {
    /// Insert a single prediction log row.
    pub async fn insert(
        pool: &PgPool,
        log: &CreatePredictionLog,
    ) -> Result<PredictionLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO predictions ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PredictionLog>(&query)
            .bind(&log.input_data)
            .bind(log.prediction)
            .bind(log.confidence)
            .bind(log.response_time_ms)
            .bind(&log.model_used)
            .bind(&log.endpoint)
            .bind(&log.error_message)
            .fetch_one(pool)
            .await
    }

    /// Most recent successful predictions, newest first.
    pub async fn list_recent_successful(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<RecentPrediction>, sqlx::Error> {
        sqlx::query_as::<_, RecentPrediction>(
            "SELECT created_at, prediction, confidence, response_time_ms \
             FROM predictions \
             WHERE error_message IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Total logged predictions.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM predictions")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Delete rows logged before `cutoff`. Returns the number removed.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM predictions WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
