//! Shared response envelope types for API handlers.
//!
//! Resource endpoints under `/api/v1` wrap their payload as `{ "data": ... }`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
