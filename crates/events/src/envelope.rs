use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for a published event: identity, routing key and business time.
///
/// Notes:
/// - `event_id` is stable across redeliveries; consumers use it for dedupe.
/// - `routing_key` is the topic the event was published under (e.g. `job.published`).
/// - `payload` is either raw JSON (on the wire) or a decoded [`crate::IntegrationEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    routing_key: String,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    /// Wrap a payload with a fresh event id, stamped now.
    pub fn new(routing_key: impl Into<String>, payload: E) -> Self {
        Self::with_metadata(Uuid::now_v7(), routing_key, Utc::now(), payload)
    }

    pub fn with_metadata(
        event_id: Uuid,
        routing_key: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            routing_key: routing_key.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Replace the payload, keeping identity and routing metadata.
    pub fn map<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            routing_key: self.routing_key,
            occurred_at: self.occurred_at,
            payload: f(self.payload),
        }
    }
}
