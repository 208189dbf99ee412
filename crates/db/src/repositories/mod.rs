//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod api_request_repo;
pub mod prediction_repo;

pub use api_request_repo::ApiRequestRepo;
pub use prediction_repo::PredictionLogRepo;
