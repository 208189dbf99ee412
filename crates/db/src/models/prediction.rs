use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use housing_core::types::{DbId, Timestamp};

/// A logged prediction attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PredictionLog {
    pub id: DbId,
    pub input_data: serde_json::Value,
    /// `None` when the prediction failed.
    pub prediction: Option<f64>,
    pub confidence: Option<f64>,
    pub response_time_ms: f64,
    pub model_used: String,
    pub endpoint: String,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a prediction log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePredictionLog {
    pub input_data: serde_json::Value,
    pub prediction: Option<f64>,
    pub confidence: Option<f64>,
    pub response_time_ms: f64,
    pub model_used: String,
    pub endpoint: String,
    pub error_message: Option<String>,
}

/// Projection used by the metrics endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecentPrediction {
    pub created_at: Timestamp,
    pub prediction: Option<f64>,
    pub confidence: Option<f64>,
    pub response_time_ms: f64,
}
