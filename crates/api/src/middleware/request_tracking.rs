//! Per-request accounting.
//!
//! Every response updates the in-memory [`MetricsTracker`](crate::metrics::MetricsTracker)
//! and is published on the event bus as an `api.request` log entry. Responses
//! with status >= 400 are additionally counted as `HTTP_{code}` errors.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use housing_db::models::api_request::CreateApiRequestLog;
use housing_events::ServiceEvent;

use crate::state::AppState;

/// Header set by `SetRequestIdLayer` further out in the stack.
const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let endpoint = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.metrics.track_request();

    let response = next.run(request).await;

    let elapsed = started.elapsed().as_secs_f64();
    state.metrics.track_response_time(elapsed);

    let status = response.status();
    let error_message = if status.as_u16() >= 400 {
        state.metrics.track_error(&format!("HTTP_{}", status.as_u16()));
        Some(format!("HTTP {}", status.as_u16()))
    } else {
        None
    };

    state.event_bus.publish(ServiceEvent::api_request(&CreateApiRequestLog {
        request_id,
        endpoint,
        method,
        status_code: i32::from(status.as_u16()),
        response_time_ms: elapsed * 1000.0,
        error_message,
    }));

    response
}
