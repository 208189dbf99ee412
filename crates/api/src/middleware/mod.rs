//! Request-level middleware.
//!
//! - [`request_tracking::track_requests`] -- Counts, times and logs every request.

pub mod request_tracking;
