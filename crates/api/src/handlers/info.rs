//! Service description and liveness.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

pub const SERVICE_TITLE: &str = "California Housing Price Prediction API";

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub model: String,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when a model is loaded, `unhealthy` otherwise.
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_name: String,
    /// Whether the log database is reachable. Does not affect `status`.
    pub db_healthy: bool,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let endpoints = BTreeMap::from([
        ("/health", "Health check"),
        ("/metrics", "API monitoring metrics"),
        ("/metrics/prometheus", "Prometheus metrics"),
        ("/api/v1/predict", "Single prediction"),
        ("/api/v1/predict/batch", "Batch predictions"),
        ("/api/v1/training-data", "Submit a training sample"),
        ("/api/v1/training-data/batch", "Submit training samples in bulk"),
        ("/api/v1/retraining/status", "Retraining status"),
        ("/api/v1/retraining/trigger", "Trigger a retrain"),
    ]);

    Json(ServiceInfo {
        message: SERVICE_TITLE,
        version: env!("CARGO_PKG_VERSION"),
        model: state.service.model_name().to_string(),
        endpoints,
    })
}

/// GET /health -- model and database health.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.service.model_loaded();
    let db_healthy = housing_db::health_check(&state.pool).await.is_ok();

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "unhealthy" },
        model_loaded,
        model_name: state.service.model_name().to_string(),
        db_healthy,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}
