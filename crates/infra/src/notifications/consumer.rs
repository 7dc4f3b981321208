use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use jobmesh_events::{EventEnvelope, EventHandler, HandlerError, IntegrationEvent};

use super::dispatcher::NotificationDispatcher;
use super::templates::{NOTIFICATION_BINDINGS, render};
use crate::error::ServiceError;

/// Fans notification-worthy events out to their recipients.
pub struct NotificationConsumer {
    dispatcher: Arc<NotificationDispatcher>,
}

impl NotificationConsumer {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl EventHandler for NotificationConsumer {
    fn name(&self) -> &'static str {
        "notification.fanout"
    }

    fn bindings(&self) -> Vec<&'static str> {
        NOTIFICATION_BINDINGS.to_vec()
    }

    fn handle(&self, envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError> {
        let Some(draft) = render(envelope.payload()) else {
            debug!(routing_key = envelope.routing_key(), "event carries no notification");
            return Ok(());
        };
        self.dispatcher
            .create_and_send(draft, Some(envelope.event_id()), Utc::now())
            .map_err(|e| HandlerError::from(ServiceError::from(e)))?;
        Ok(())
    }
}
