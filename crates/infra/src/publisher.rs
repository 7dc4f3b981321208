//! Typed publishing on top of the wire-level bus.

use serde_json::Value as JsonValue;
use tracing::{error, instrument};

use jobmesh_events::{EventBus, EventEnvelope, IntegrationEvent};

use crate::error::ServiceError;

/// Publishes integration events. Services depend on this instead of the bus so
/// they never handle untyped JSON.
pub trait Publisher: Send + Sync {
    fn publish_event(&self, event: &IntegrationEvent) -> Result<(), ServiceError>;

    /// Publish in order, stopping at the first failure.
    fn publish_all(&self, events: &[IntegrationEvent]) -> Result<(), ServiceError> {
        for event in events {
            self.publish_event(event).inspect_err(|e| {
                error!(routing_key = event.routing_key(), error = %e, "integration event not published");
            })?;
        }
        Ok(())
    }
}

impl<B> Publisher for B
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[instrument(skip(self, event), fields(routing_key = event.routing_key()), err)]
    fn publish_event(&self, event: &IntegrationEvent) -> Result<(), ServiceError> {
        let envelope = event
            .to_envelope()
            .map_err(|e| ServiceError::Publish(e.to_string()))?;
        self.publish(envelope)
            .map_err(|e| ServiceError::Publish(format!("{e:?}")))
    }
}
