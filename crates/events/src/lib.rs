//! Event exchange mechanics and the marketplace's integration-event contract.
//!
//! - [`bus`]: topic publish/subscribe with acknowledge-after-success deliveries
//! - [`routing`]: AMQP-style routing-key patterns (`*`, `#`)
//! - [`integration`]: one typed variant per routing key
//! - [`handler`]: the consumer contract used by background workers

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod integration;
pub mod routing;

pub use bus::{Acknowledger, Binding, Delivery, EventBus, Routed, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::{EventHandler, HandlerError};
pub use in_memory_bus::{DeadLetter, InMemoryBusError, InMemoryEventBus};
pub use integration::{DecodeError, IntegrationEvent};
