use axum::routing::post;
use axum::Router;

use crate::handlers::predict;
use crate::state::AppState;

/// Mount prediction routes, nested at `/predict`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(predict::predict))
        .route("/batch", post(predict::predict_batch))
}
