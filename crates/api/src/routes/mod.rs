pub mod health;
pub mod metrics;
pub mod predict;
pub mod retraining;
pub mod training_data;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /predict                       single prediction (POST)
/// /predict/batch                 batch prediction, 1..=1000 rows (POST)
///
/// /training-data                 submit one sample (POST)
/// /training-data/batch           submit many samples (POST)
///
/// /retraining/status             lifecycle view (GET)
/// /retraining/trigger            run a retrain (POST, long timeout)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .nest("/predict", predict::router())
        .nest("/training-data", training_data::router())
        .route_layer(timeout_layer(config.request_timeout_secs))
        .nest("/retraining", retraining::router(config))
}

/// Timeout answering `408 Request Timeout` after `secs`.
pub(crate) fn timeout_layer(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}
