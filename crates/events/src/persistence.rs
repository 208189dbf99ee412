//! Durable log persistence.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes prediction and request events to the `predictions` and
//! `api_requests` tables. Other event types are not persisted. The loop ends
//! when the bus sender is dropped.

use housing_db::models::api_request::CreateApiRequestLog;
use housing_db::models::prediction::CreatePredictionLog;
use housing_db::repositories::{ApiRequestRepo, PredictionLogRepo};
use housing_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::{event_types, ServiceEvent};

/// Background service that persists log events to the database.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<ServiceEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &ServiceEvent) -> Result<(), sqlx::Error> {
        match event.event_type.as_str() {
            event_types::PREDICTION_COMPLETED | event_types::PREDICTION_FAILED => {
                let log: CreatePredictionLog = decode(event)?;
                PredictionLogRepo::insert(pool, &log).await?;
            }
            event_types::API_REQUEST => {
                let log: CreateApiRequestLog = decode(event)?;
                ApiRequestRepo::insert(pool, &log).await?;
            }
            other => tracing::trace!(event_type = other, "Event not persisted"),
        }
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &ServiceEvent) -> Result<T, sqlx::Error> {
    serde_json::from_value(event.payload.clone()).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
