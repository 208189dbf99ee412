use axum::routing::{get, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers::retraining;
use crate::routes::timeout_layer;
use crate::state::AppState;

/// Mount retraining routes, nested at `/retraining`.
///
/// The trigger gets its own, longer timeout. A timed-out request does not
/// abort the run; it completes and is audited in the background.
pub fn router(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/status", get(retraining::status))
        .route_layer(timeout_layer(config.request_timeout_secs))
        .route(
            "/trigger",
            post(retraining::trigger).layer(timeout_layer(config.retrain_timeout_secs)),
        )
}
