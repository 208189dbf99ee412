//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`. Publishing never blocks and
//! never fails; with no subscribers the event is dropped.

use chrono::{DateTime, Utc};
use housing_db::models::api_request::CreateApiRequestLog;
use housing_db::models::prediction::CreatePredictionLog;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event type names published by the service.
pub mod event_types {
    pub const PREDICTION_COMPLETED: &str = "prediction.completed";
    pub const PREDICTION_FAILED: &str = "prediction.failed";
    pub const API_REQUEST: &str = "api.request";
    pub const TRAINING_DATA_ADDED: &str = "training_data.added";
    pub const RETRAIN_COMPLETED: &str = "retrain.completed";
    pub const RETRAIN_FAILED: &str = "retrain.failed";
}

// ---------------------------------------------------------------------------
// ServiceEvent
// ---------------------------------------------------------------------------

/// Something that happened in the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,

    /// Event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ServiceEvent {
    /// Create an event with an empty object payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// A prediction log entry; typed as completed or failed by its error field.
    pub fn prediction(log: &CreatePredictionLog) -> Self {
        let event_type = if log.error_message.is_some() {
            event_types::PREDICTION_FAILED
        } else {
            event_types::PREDICTION_COMPLETED
        };
        Self::new(event_type).with_payload(to_payload(log))
    }

    pub fn api_request(log: &CreateApiRequestLog) -> Self {
        Self::new(event_types::API_REQUEST).with_payload(to_payload(log))
    }
}

fn to_payload<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Event payload failed to serialize");
        serde_json::Value::Null
    })
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use housing_events::bus::{EventBus, ServiceEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ServiceEvent::new("training_data.added"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ServiceEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ServiceEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction_log(error: Option<&str>) -> CreatePredictionLog {
        CreatePredictionLog {
            input_data: serde_json::json!({"MedInc": 3.0}),
            prediction: error.is_none().then_some(210.5),
            confidence: None,
            response_time_ms: 2.0,
            model_used: "DecisionTree".into(),
            endpoint: "/api/v1/predict".into(),
            error_message: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn subscribers_each_receive_events() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(ServiceEvent::new(event_types::TRAINING_DATA_ADDED)
            .with_payload(serde_json::json!({"count": 3})));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, "training_data.added");
        assert_eq!(e2.payload["count"], 3);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(ServiceEvent::new("orphan.event"));
    }

    #[test]
    fn prediction_event_type_follows_outcome() {
        let ok = ServiceEvent::prediction(&prediction_log(None));
        assert_eq!(ok.event_type, event_types::PREDICTION_COMPLETED);
        assert_eq!(ok.payload["prediction"], 210.5);

        let failed = ServiceEvent::prediction(&prediction_log(Some("bad input")));
        assert_eq!(failed.event_type, event_types::PREDICTION_FAILED);
        assert!(failed.payload["prediction"].is_null());
    }

    #[test]
    fn payload_round_trips_to_insert_dto() {
        let log = prediction_log(None);
        let event = ServiceEvent::prediction(&log);
        let back: CreatePredictionLog = serde_json::from_value(event.payload).unwrap();
        assert_eq!(back, log);
    }
}
