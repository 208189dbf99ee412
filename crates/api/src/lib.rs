//! Housing price API server library.
//!
//! Exposes the building blocks (config, state, error handling, metrics,
//! routes, background jobs) so integration tests and the binary entrypoint
//! can both access them.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
