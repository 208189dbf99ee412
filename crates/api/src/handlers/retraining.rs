//! Retraining status and manual trigger.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use housing_events::{event_types, ServiceEvent};
use housing_retraining::executor::{RetrainFailure, RetrainReport};
use housing_retraining::status::RetrainingStatus;
use housing_retraining::{RetrainOutcome, RetrainRejection};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppResult;
use crate::handlers::run_blocking;
use crate::response::DataResponse;
use crate::state::AppState;

/// Reason recorded when the caller gives none.
pub const DEFAULT_TRIGGER_REASON: &str = "manual";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TriggerRequest {
    pub reason: Option<String>,
    /// Skip the new-sample threshold. Quota and empty-store checks still apply.
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// `success` or `error`.
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RetrainReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RetrainRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RetrainFailure>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/retraining/status
pub async fn status(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<RetrainingStatus>>> {
    let service = state.service.clone();
    let status = run_blocking(move || service.status()).await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/retraining/trigger
///
/// | Outcome                      | Status |
/// |------------------------------|--------|
/// | completed                    | 200    |
/// | daily quota exhausted        | 429    |
/// | no new data / below threshold| 409    |
/// | execution failed             | 500    |
pub async fn trigger(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> (StatusCode, Json<TriggerResponse>) {
    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TRIGGER_REASON.to_string());

    tracing::info!(reason = %reason, force = request.force, "Retrain requested");
    let outcome = state.service.trigger(&reason, request.force).await;
    publish_outcome(&state, &reason, &outcome);

    let status = outcome.status();
    let message = outcome.message();
    let (code, response) = match outcome {
        RetrainOutcome::Completed(report) => (
            StatusCode::OK,
            TriggerResponse {
                status,
                message,
                report: Some(report),
                rejection: None,
                failure: None,
            },
        ),
        RetrainOutcome::Rejected(rejection) => (
            rejection_status(&rejection),
            TriggerResponse {
                status,
                message,
                report: None,
                rejection: Some(rejection),
                failure: None,
            },
        ),
        RetrainOutcome::Failed(failure) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            TriggerResponse {
                status,
                message,
                report: None,
                rejection: None,
                failure: Some(failure),
            },
        ),
    };
    (code, Json(response))
}

fn rejection_status(rejection: &RetrainRejection) -> StatusCode {
    match rejection {
        RetrainRejection::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        RetrainRejection::NoNewData | RetrainRejection::BelowThreshold { .. } => {
            StatusCode::CONFLICT
        }
    }
}

fn publish_outcome(state: &AppState, reason: &str, outcome: &RetrainOutcome) {
    let event = match outcome {
        RetrainOutcome::Completed(report) => {
            ServiceEvent::new(event_types::RETRAIN_COMPLETED).with_payload(json!({
                "reason": reason,
                "model_name": report.model_name,
                "rmse": report.performance.rmse,
                "r2_score": report.performance.r2_score,
                "new_samples_used": report.new_samples_used,
                "duration_seconds": report.duration_seconds,
            }))
        }
        RetrainOutcome::Failed(failure) => {
            ServiceEvent::new(event_types::RETRAIN_FAILED).with_payload(json!({
                "reason": reason,
                "error": failure.message,
                "audited": failure.audited,
            }))
        }
        RetrainOutcome::Rejected(_) => return,
    };
    state.event_bus.publish(event);
}
