//! Periodic cleanup of old prediction and request log rows.
//!
//! Deletes rows from `predictions` and `api_requests` older than the
//! configured retention period. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::time::Duration;

use chrono::Utc;
use housing_db::repositories::{ApiRequestRepo, PredictionLogRepo};
use housing_db::DbPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the log retention loop until `cancel` is triggered.
pub async fn run(pool: DbPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Log retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Log retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::days(retention_days);
                match PredictionLogRepo::delete_older_than(&pool, cutoff).await {
                    Ok(0) => tracing::debug!("Log retention: no prediction rows to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Log retention: purged old predictions"),
                    Err(e) => {
                        tracing::error!(error = %e, "Log retention: prediction cleanup failed")
                    }
                }
                match ApiRequestRepo::delete_older_than(&pool, cutoff).await {
                    Ok(0) => tracing::debug!("Log retention: no request rows to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Log retention: purged old requests"),
                    Err(e) => tracing::error!(error = %e, "Log retention: request cleanup failed"),
                }
            }
        }
    }
}
