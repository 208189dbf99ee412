use axum::routing::get;
use axum::Router;

use crate::handlers::info;
use crate::state::AppState;

/// Mount service info and health routes (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(info::root))
        .route("/health", get(info::health))
}
