//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides a **topic exchange**: producers publish under a routing key,
//! consumers bind a named queue to one or more key patterns.
//!
//! ## Delivery Guarantees
//!
//! - **At-least-once**: a delivery stays owed until the consumer calls [`Delivery::ack`].
//!   [`Delivery::nack`] makes it eligible for redelivery with an incremented attempt
//!   counter; after the bus's redelivery limit it is dead-lettered, never dropped.
//! - **No ordering across routing keys**; ordering within one key is best-effort.
//! - **Broadcast across queues**: every bound queue whose pattern matches gets a copy.
//!
//! Consumers must therefore be idempotent.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::envelope::EventEnvelope;
use crate::routing::topic_matches;

/// Anything that can be routed through a topic exchange.
pub trait Routed {
    fn routing_key(&self) -> &str;
}

impl<E> Routed for EventEnvelope<E> {
    fn routing_key(&self) -> &str {
        EventEnvelope::routing_key(self)
    }
}

/// A named queue bound to routing-key patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    queue: String,
    patterns: Vec<String>,
}

impl Binding {
    pub fn new<I, P>(queue: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            queue: queue.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a message published under `routing_key` lands in this queue.
    pub fn matches(&self, routing_key: &str) -> bool {
        self.patterns.iter().any(|p| topic_matches(p, routing_key))
    }
}

/// Settles a delivery with the transport that produced it.
pub trait Acknowledger<M>: Send + Sync {
    /// Processing succeeded; forget the message.
    fn ack(&self, tag: &str);

    /// Processing failed; redeliver (or dead-letter once the limit is reached).
    fn nack(self: Arc<Self>, tag: String, message: M, attempt: u32);

    /// The message can never be processed (e.g. undecodable); dead-letter now.
    fn reject(&self, tag: &str, message: M, attempt: u32, reason: &str);
}

/// One delivery of a message to a queue.
pub struct Delivery<M> {
    message: M,
    attempt: u32,
    tag: String,
    acker: Arc<dyn Acknowledger<M>>,
}

impl<M> Delivery<M> {
    pub fn new(message: M, attempt: u32, tag: impl Into<String>, acker: Arc<dyn Acknowledger<M>>) -> Self {
        Self {
            message,
            attempt,
            tag: tag.into(),
            acker,
        }
    }

    pub fn message(&self) -> &M {
        &self.message
    }

    /// 1-based delivery attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Transport-specific delivery tag (e.g. a stream entry id).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn ack(self) {
        self.acker.ack(&self.tag);
    }

    pub fn nack(self) {
        let Delivery {
            message,
            attempt,
            tag,
            acker,
        } = self;
        acker.nack(tag, message, attempt);
    }

    pub fn reject(self, reason: &str) {
        self.acker.reject(&self.tag, self.message, self.attempt, reason);
    }
}

impl<M: core::fmt::Debug> core::fmt::Debug for Delivery<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("attempt", &self.attempt)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// A subscription to a bound queue.
///
/// Designed for single-threaded consumption: one worker per subscription.
///
/// ```ignore
/// let sub = bus.subscribe(Binding::new("search.projection", ["job.#"]));
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(delivery) => match handle(delivery.message()) {
///             Ok(()) => delivery.ack(),
///             Err(_) => delivery.nack(),
///         },
///         Err(RecvTimeoutError::Timeout) => continue, // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<Delivery<M>>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<Delivery<M>>) -> Self {
        Self { receiver }
    }

    /// Block until the next delivery is available.
    pub fn recv(&self) -> Result<Delivery<M>, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a delivery without blocking.
    pub fn try_recv(&self) -> Result<Delivery<M>, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a delivery.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Delivery<M>, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic topic exchange.
///
/// `publish` can fail (bus unreachable, lock poisoned); the caller decides
/// whether to retry. Implementations must be safe to share across threads.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    /// Bind a queue and start receiving matching messages.
    fn subscribe(&self, binding: Binding) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self, binding: Binding) -> Subscription<M> {
        (**self).subscribe(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_any_of_its_patterns() {
        let binding = Binding::new("subscription.cache", ["company.created", "company.subscription.*"]);
        assert!(binding.matches("company.created"));
        assert!(binding.matches("company.subscription.updated"));
        assert!(!binding.matches("company.verified"));
    }
}
