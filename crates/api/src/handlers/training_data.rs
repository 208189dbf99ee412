//! Ground-truth sample submission.

use axum::extract::State;
use axum::Json;
use housing_events::{event_types, ServiceEvent};
use housing_retraining::sample_store::SampleSubmission;
use housing_retraining::service::{BatchReceipt, SubmitReceipt};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::handlers::run_blocking;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TrainingBatchRequest {
    pub samples: Vec<SampleSubmission>,
}

/// POST /api/v1/training-data
///
/// A missing feature or an out-of-range value rejects the sample with 400.
pub async fn submit_sample(
    State(state): State<AppState>,
    Json(sample): Json<SampleSubmission>,
) -> AppResult<Json<SubmitReceipt>> {
    let service = state.service.clone();
    let receipt =
        run_blocking(move || service.submit_sample(&sample.features, sample.target)).await??;

    state.event_bus.publish(
        ServiceEvent::new(event_types::TRAINING_DATA_ADDED).with_payload(json!({
            "added": 1,
            "new_sample_count": receipt.new_sample_count,
        })),
    );
    Ok(Json(receipt))
}

/// POST /api/v1/training-data/batch
///
/// Invalid samples do not abort the batch; they are listed by index in
/// `failures` and the response stays 200.
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(request): Json<TrainingBatchRequest>,
) -> AppResult<Json<BatchReceipt>> {
    if request.samples.is_empty() {
        return Err(AppError::BadRequest("Empty batch provided".into()));
    }

    let service = state.service.clone();
    let receipt = run_blocking(move || service.submit_batch(&request.samples)).await?;

    if receipt.samples_added > 0 {
        state.event_bus.publish(
            ServiceEvent::new(event_types::TRAINING_DATA_ADDED).with_payload(json!({
                "added": receipt.samples_added,
                "failed": receipt.failed_samples,
                "new_sample_count": receipt.total_samples,
            })),
        );
    }
    Ok(Json(receipt))
}
