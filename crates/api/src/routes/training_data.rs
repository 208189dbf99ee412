use axum::routing::post;
use axum::Router;

use crate::handlers::training_data;
use crate::state::AppState;

/// Mount training data routes, nested at `/training-data`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(training_data::submit_sample))
        .route("/batch", post(training_data::submit_batch))
}
