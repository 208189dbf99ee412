//! Domain logic for the California housing price service.
//!
//! Everything here is pure: callers hand in data and get values back. File
//! and network I/O live in `housing-retraining`, `housing-db` and the API.

pub mod dataset;
pub mod decision;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod prediction;
pub mod regression;
pub mod types;
