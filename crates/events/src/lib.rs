//! Housing service event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ServiceEvent`]: the event envelope (dot-separated type + JSON payload).
//! - [`EventPersistence`]: background subscriber writing prediction and
//!   request events to their log tables.

pub mod bus;
pub mod persistence;

pub use bus::{event_types, EventBus, ServiceEvent};
pub use persistence::EventPersistence;
