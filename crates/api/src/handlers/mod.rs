//! HTTP handlers, one module per resource.
//!
//! Handlers stay thin: they extract and validate input, call
//! [`HousingService`](housing_retraining::HousingService), publish log events
//! and shape the response.

pub mod info;
pub mod metrics;
pub mod predict;
pub mod retraining;
pub mod training_data;

use crate::error::{AppError, AppResult};

/// Run file-backed service work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Blocking task failed: {e}")))
}
