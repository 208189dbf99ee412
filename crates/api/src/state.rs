use std::sync::Arc;

use housing_retraining::HousingService;

use crate::config::ServerConfig;
use crate::metrics::MetricsTracker;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool for the prediction and request logs.
    pub pool: housing_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Serving facade: predictions, training data, retraining.
    pub service: Arc<HousingService>,
    /// In-memory API and retraining counters.
    pub metrics: Arc<MetricsTracker>,
    /// Event bus for prediction and request log events.
    pub event_bus: Arc<housing_events::EventBus>,
}
