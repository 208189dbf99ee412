//! Online retraining lifecycle for the housing price model.
//!
//! New ground-truth samples accumulate in a [`sample_store::SampleStore`];
//! the [`executor::Retrainer`] merges them with the baseline dataset, fits a
//! fresh model and swaps it in atomically; every executed attempt lands in
//! the bounded [`audit::AuditLog`]. [`service::HousingService`] ties these
//! together with the serving model for the HTTP layer.

pub mod artifact;
pub mod audit;
pub mod baseline;
pub mod config;
pub mod error;
pub mod executor;
pub mod sample_store;
pub mod service;
pub mod serving;
pub mod status;
pub mod telemetry;

pub use config::RetrainConfig;
pub use error::{RetrainError, StoreError};
pub use executor::{RetrainOutcome, RetrainRejection};
pub use service::HousingService;
