use thiserror::Error;

use crate::envelope::EventEnvelope;
use crate::integration::IntegrationEvent;

/// Failure while consuming an event. The delivery is nacked for redelivery.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A collaborator (cache, store, push provider) could not be reached.
    #[error("dependency unavailable: {0}")]
    Dependency(String),

    /// The handler itself failed.
    #[error("processing failed: {0}")]
    Processing(String),
}

/// An idempotent consumer of integration events.
///
/// Workers bind a queue named [`EventHandler::name`] to [`EventHandler::bindings`]
/// and acknowledge a delivery only after `handle` returns `Ok`. Handlers must
/// be safe to re-run with the same envelope.
pub trait EventHandler: Send + Sync {
    /// Queue name (stable across restarts so durable transports resume).
    fn name(&self) -> &'static str;

    /// Routing-key patterns this handler consumes.
    fn bindings(&self) -> Vec<&'static str>;

    fn handle(&self, envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError>;
}

impl<H> EventHandler for std::sync::Arc<H>
where
    H: EventHandler + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn bindings(&self) -> Vec<&'static str> {
        (**self).bindings()
    }

    fn handle(&self, envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError> {
        (**self).handle(envelope)
    }
}
