//! Price predictions.
//!
//! Every call, successful or not, is published as a prediction log event.
//! A batch is logged as a single row carrying the mean price and confidence.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use housing_core::error::CoreError;
use housing_core::features::HousingFeatures;
use housing_db::models::prediction::CreatePredictionLog;
use housing_events::ServiceEvent;
use housing_retraining::service::Prediction;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

const PREDICT_ENDPOINT: &str = "/api/v1/predict";
const PREDICT_BATCH_ENDPOINT: &str = "/api/v1/predict/batch";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BatchPredictionRequest {
    pub features: Vec<HousingFeatures>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BatchPredictionResponse {
    pub predictions: Vec<Prediction>,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/predict
pub async fn predict(
    State(state): State<AppState>,
    Json(features): Json<HousingFeatures>,
) -> AppResult<Json<PredictionResponse>> {
    let started = Instant::now();
    let result = state.service.predict(&features);
    let model_used = state.service.model_name().to_string();

    let mut log = CreatePredictionLog {
        input_data: json!(features),
        prediction: None,
        confidence: None,
        response_time_ms: elapsed_ms(started),
        model_used: model_used.clone(),
        endpoint: PREDICT_ENDPOINT.to_string(),
        error_message: None,
    };

    match result {
        Ok(prediction) => {
            log.prediction = Some(prediction.predicted_price);
            log.confidence = Some(prediction.confidence_score);
            record(&state, log, PREDICT_ENDPOINT, 1);
            tracing::info!(
                predicted_price = prediction.predicted_price,
                confidence = prediction.confidence_score,
                "Prediction served"
            );
            Ok(Json(PredictionResponse {
                prediction,
                model_used,
                timestamp: Utc::now(),
            }))
        }
        Err(e) => {
            record_failure(&state, log, PREDICT_ENDPOINT, &e);
            Err(e.into())
        }
    }
}

/// POST /api/v1/predict/batch
pub async fn predict_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchPredictionRequest>,
) -> AppResult<Json<BatchPredictionResponse>> {
    let started = Instant::now();
    let batch = request.features;
    let result = state.service.predict_batch(&batch);
    let model_used = state.service.model_name().to_string();
    state.metrics.track_prediction_batch_size(batch.len());

    let mut log = CreatePredictionLog {
        input_data: json!({ "batch_size": batch.len(), "features": batch }),
        prediction: None,
        confidence: None,
        response_time_ms: elapsed_ms(started),
        model_used: model_used.clone(),
        endpoint: PREDICT_BATCH_ENDPOINT.to_string(),
        error_message: None,
    };

    match result {
        Ok(predictions) => {
            let count = predictions.len();
            log.prediction = Some(mean(predictions.iter().map(|p| p.predicted_price)));
            log.confidence = Some(mean(predictions.iter().map(|p| p.confidence_score)));
            record(&state, log, PREDICT_BATCH_ENDPOINT, count);
            tracing::info!(count, "Batch prediction served");
            Ok(Json(BatchPredictionResponse {
                predictions,
                model_used,
                timestamp: Utc::now(),
                count,
            }))
        }
        Err(e) => {
            record_failure(&state, log, PREDICT_BATCH_ENDPOINT, &e);
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(state: &AppState, log: CreatePredictionLog, endpoint: &str, served: usize) {
    state.metrics.track_predictions(served);
    state.metrics.track_prediction_request(endpoint, "success");
    state.event_bus.publish(ServiceEvent::prediction(&log));
}

fn record_failure(state: &AppState, mut log: CreatePredictionLog, endpoint: &str, err: &CoreError) {
    tracing::warn!(endpoint, error = %err, "Prediction failed");
    log.error_message = Some(err.to_string());
    state.metrics.track_prediction_request(endpoint, "error");
    state.event_bus.publish(ServiceEvent::prediction(&log));
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}
