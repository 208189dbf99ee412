use axum::routing::get;
use axum::Router;

use crate::handlers::metrics;
use crate::state::AppState;

/// Mount monitoring routes (root level).
///
/// ```text
/// /metrics              JSON summary
/// /metrics/prometheus   Prometheus text exposition
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics::metrics_summary))
        .route("/metrics/prometheus", get(metrics::prometheus))
}
