//! Periodic automatic retraining.
//!
//! On every tick the decision policy is consulted through the status view;
//! when it says retrain, a non-forced trigger runs with
//! [`AUTOMATIC_REASON`]. The executor re-checks quota and threshold itself,
//! so a stale status only costs a rejected attempt.

use std::sync::Arc;
use std::time::Duration;

use housing_retraining::{HousingService, RetrainOutcome};
use tokio_util::sync::CancellationToken;

/// Reason recorded in the audit log for scheduler-initiated runs.
pub const AUTOMATIC_REASON: &str = "automatic: threshold reached";

/// Run one check. Returns the outcome if a retrain was attempted.
pub async fn check_once(service: &Arc<HousingService>) -> Option<RetrainOutcome> {
    let reader = Arc::clone(service);
    let status = match tokio::task::spawn_blocking(move || reader.status()).await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(error = %e, "Auto-retrain: status task failed");
            return None;
        }
    };
    if let Some(error) = &status.error {
        tracing::warn!(error = %error, "Auto-retrain: status partially unavailable");
    }

    if !status.should_retrain {
        tracing::debug!(reason = %status.retrain_reason, "Auto-retrain: not needed");
        return None;
    }
    if status.daily_retrain_attempts >= status.max_daily_attempts {
        tracing::debug!(
            attempts = status.daily_retrain_attempts,
            max = status.max_daily_attempts,
            "Auto-retrain: daily quota exhausted"
        );
        return None;
    }

    let outcome = service.trigger(AUTOMATIC_REASON, false).await;
    tracing::info!(
        status = outcome.status(),
        message = %outcome.message(),
        "Auto-retrain finished"
    );
    Some(outcome)
}

/// Run the auto-retrain loop every `period` until `cancel` is triggered.
pub async fn run(service: Arc<HousingService>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Auto-retrain job started");

    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; skip it so startup is not a retrain.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Auto-retrain job stopping");
                break;
            }
            _ = interval.tick() => {
                check_once(&service).await;
            }
        }
    }
}
