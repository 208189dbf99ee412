use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use housing_core::types::{DbId, Timestamp};

/// A logged HTTP request.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiRequestLog {
    pub id: DbId,
    pub request_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: f64,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a request log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateApiRequestLog {
    pub request_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: f64,
    pub error_message: Option<String>,
}
