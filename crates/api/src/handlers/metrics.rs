//! Monitoring endpoints: JSON summary and Prometheus exposition.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use housing_db::models::prediction::RecentPrediction;
use housing_db::repositories::{ApiRequestRepo, PredictionLogRepo};
use serde::Serialize;

use crate::metrics::{ApiStatistics, BasicStats, ModelStats, PerformanceMetrics};
use crate::state::AppState;

/// Rows of `recent_predictions` in the JSON report.
const RECENT_PREDICTIONS_SHOWN: i64 = 10;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_loaded: bool,
    pub model_stats: ModelStats,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub total_predictions: i64,
    pub total_requests: i64,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub stats: DatabaseStats,
}

#[derive(Debug, Serialize)]
pub struct MetricsReport {
    pub timestamp: DateTime<Utc>,
    pub api_statistics: ApiStatistics,
    pub performance_metrics: PerformanceMetrics,
    pub error_breakdown: BTreeMap<String, u64>,
    pub model_info: ModelInfo,
    pub recent_predictions: Vec<RecentPrediction>,
    pub database_health: DatabaseHealth,
}

/// Returned instead of [`MetricsReport`] when the log database cannot be read.
#[derive(Debug, Serialize)]
pub struct DegradedMetrics {
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub basic_stats: BasicStats,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MetricsResponse {
    Full(Box<MetricsReport>),
    Degraded(DegradedMetrics),
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /metrics
///
/// Always answers 200; a database failure yields the degraded body.
pub async fn metrics_summary(State(state): State<AppState>) -> Json<MetricsResponse> {
    match database_health(&state).await {
        Ok((database_health, recent_predictions)) => {
            let model_name = state.service.model_name().to_string();
            Json(MetricsResponse::Full(Box::new(MetricsReport {
                timestamp: Utc::now(),
                api_statistics: state.metrics.api_statistics(),
                performance_metrics: state.metrics.performance_metrics(),
                error_breakdown: state.metrics.error_breakdown(),
                model_info: ModelInfo {
                    model_stats: state.metrics.model_stats(&model_name),
                    model_name,
                    model_loaded: state.service.model_loaded(),
                },
                recent_predictions,
                database_health,
            })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Error generating metrics");
            Json(MetricsResponse::Degraded(DegradedMetrics {
                timestamp: Utc::now(),
                error: format!("Unable to generate metrics: {e}"),
                basic_stats: state.metrics.basic_stats(),
                model_loaded: state.service.model_loaded(),
            }))
        }
    }
}

async fn database_health(
    state: &AppState,
) -> Result<(DatabaseHealth, Vec<RecentPrediction>), sqlx::Error> {
    let total_predictions = PredictionLogRepo::count(&state.pool).await?;
    let total_requests = ApiRequestRepo::count(&state.pool).await?;
    let recent =
        PredictionLogRepo::list_recent_successful(&state.pool, RECENT_PREDICTIONS_SHOWN).await?;
    Ok((
        DatabaseHealth {
            connected: true,
            stats: DatabaseStats {
                total_predictions,
                total_requests,
            },
        },
        recent,
    ))
}

/// GET /metrics/prometheus
pub async fn prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .render_prometheus(state.service.model_loaded());
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}
