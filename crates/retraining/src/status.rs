use serde::Serialize;

use crate::audit::RetrainAttempt;

/// Thresholds the status view reports alongside the verdict.
#[derive(Debug, Clone, Serialize)]
pub struct Thresholds {
    pub min_new_samples: usize,
}

/// Read-only composite view of the retraining lifecycle.
///
/// Built best-effort: if one source cannot be read its fields fall back to
/// defaults and the cause is appended to `error`.
#[derive(Debug, Clone, Serialize)]
pub struct RetrainingStatus {
    pub new_data_samples: usize,
    /// Whole days since the serving artifact was written; `None` without one.
    pub model_age_days: Option<u64>,
    pub should_retrain: bool,
    pub retrain_reason: String,
    pub daily_retrain_attempts: usize,
    pub max_daily_attempts: usize,
    pub thresholds: Thresholds,
    /// Newest last.
    pub recent_retrains: Vec<RetrainAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
