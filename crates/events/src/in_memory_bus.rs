//! In-memory topic exchange for tests/dev.

use std::sync::{Arc, Mutex, Weak, mpsc};

use thiserror::Error;
use tracing::{error, warn};

use crate::bus::{Acknowledger, Binding, Delivery, EventBus, Routed, Subscription};

/// Default number of deliveries before a message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// A message that exhausted its deliveries (or was rejected outright).
#[derive(Debug, Clone)]
pub struct DeadLetter<M> {
    pub queue: String,
    pub message: M,
    pub attempts: u32,
    pub reason: String,
}

type DeadLetters<M> = Arc<Mutex<Vec<DeadLetter<M>>>>;

type QueueSender<M> = mpsc::Sender<Delivery<M>>;

struct Queue<M> {
    binding: Binding,
    tx: Arc<QueueSender<M>>,
    acker: Arc<QueueAcker<M>>,
}

/// In-memory pub/sub bus with exclusive queues.
///
/// - No IO / no async
/// - Each `subscribe` creates its own queue; matching messages are copied to every queue
/// - `nack` requeues at the tail of the same queue until `max_deliveries`
/// - The bus owns the only live sender per queue, so dropping the bus
///   disconnects every subscription once its backlog is drained
pub struct InMemoryEventBus<M> {
    queues: Mutex<Vec<Queue<M>>>,
    dead_letters: DeadLetters<M>,
    max_deliveries: u32,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::with_max_deliveries(DEFAULT_MAX_DELIVERIES)
    }

    pub fn with_max_deliveries(max_deliveries: u32) -> Self {
        Self {
            queues: Mutex::new(Vec::new()),
            dead_letters: Arc::new(Mutex::new(Vec::new())),
            max_deliveries: max_deliveries.max(1),
        }
    }
}

impl<M: Clone> InMemoryEventBus<M> {
    /// Snapshot of dead-lettered messages.
    pub fn dead_letters(&self) -> Vec<DeadLetter<M>> {
        self.dead_letters
            .lock()
            .map(|dl| dl.clone())
            .unwrap_or_default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> core::fmt::Debug for InMemoryEventBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("max_deliveries", &self.max_deliveries)
            .finish_non_exhaustive()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Routed + Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut queues = self.queues.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        queues.retain(|q| {
            if !q.binding.matches(message.routing_key()) {
                return true;
            }
            let acker: Arc<dyn Acknowledger<M>> = q.acker.clone();
            q.tx.send(Delivery::new(message.clone(), 1, "", acker)).is_ok()
        });

        Ok(())
    }

    fn subscribe(&self, binding: Binding) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        let tx = Arc::new(tx);
        let acker = Arc::new(QueueAcker {
            queue: binding.queue().to_string(),
            tx: Arc::downgrade(&tx),
            max_deliveries: self.max_deliveries,
            dead_letters: self.dead_letters.clone(),
        });

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut queues) = self.queues.lock() {
            queues.push(Queue { binding, tx, acker });
        }

        Subscription::new(rx)
    }
}

struct QueueAcker<M> {
    queue: String,
    // Weak so in-flight deliveries never keep a dropped queue open.
    tx: Weak<QueueSender<M>>,
    max_deliveries: u32,
    dead_letters: DeadLetters<M>,
}

impl<M> QueueAcker<M> {
    fn dead_letter(&self, message: M, attempts: u32, reason: &str) {
        error!(
            queue = %self.queue,
            attempts,
            reason,
            "message dead-lettered"
        );
        if let Ok(mut dl) = self.dead_letters.lock() {
            dl.push(DeadLetter {
                queue: self.queue.clone(),
                message,
                attempts,
                reason: reason.to_string(),
            });
        }
    }
}

impl<M: Send + 'static> Acknowledger<M> for QueueAcker<M> {
    fn ack(&self, _tag: &str) {}

    fn nack(self: Arc<Self>, tag: String, message: M, attempt: u32) {
        if attempt >= self.max_deliveries {
            self.dead_letter(message, attempt, "max deliveries exceeded");
            return;
        }

        let Some(tx) = self.tx.upgrade() else {
            warn!(queue = %self.queue, "requeue failed: queue is gone");
            return;
        };
        let acker: Arc<dyn Acknowledger<M>> = self.clone();
        if tx.send(Delivery::new(message, attempt + 1, tag, acker)).is_err() {
            warn!(queue = %self.queue, "requeue failed: subscriber is gone");
        }
    }

    fn reject(&self, _tag: &str, message: M, attempt: u32, reason: &str) {
        self.dead_letter(message, attempt, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventEnvelope;

    fn env(key: &str) -> EventEnvelope<u32> {
        EventEnvelope::new(key, 1)
    }

    #[test]
    fn publish_routes_by_pattern() {
        let bus = InMemoryEventBus::new();
        let jobs = bus.subscribe(Binding::new("jobs", ["job.*"]));
        let companies = bus.subscribe(Binding::new("companies", ["company.#"]));

        bus.publish(env("job.hot")).unwrap();
        bus.publish(env("company.subscription.updated")).unwrap();

        assert_eq!(jobs.try_recv().unwrap().message().routing_key(), "job.hot");
        assert!(jobs.try_recv().is_err());
        assert_eq!(
            companies.try_recv().unwrap().message().routing_key(),
            "company.subscription.updated"
        );
    }

    #[test]
    fn every_matching_queue_gets_a_copy() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe(Binding::new("search", ["job.published"]));
        let b = bus.subscribe(Binding::new("notification", ["job.published"]));

        bus.publish(env("job.published")).unwrap();

        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn nack_redelivers_with_incremented_attempt() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe(Binding::new("q", ["#"]));
        bus.publish(env("job.hot")).unwrap();

        let first = sub.try_recv().unwrap();
        assert_eq!(first.attempt(), 1);
        first.nack();

        let second = sub.try_recv().unwrap();
        assert_eq!(second.attempt(), 2);
        second.ack();
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn exhausted_deliveries_are_dead_lettered() {
        let bus = InMemoryEventBus::with_max_deliveries(2);
        let sub = bus.subscribe(Binding::new("q", ["#"]));
        bus.publish(env("job.hot")).unwrap();

        sub.try_recv().unwrap().nack();
        sub.try_recv().unwrap().nack();

        assert!(sub.try_recv().is_err());
        let dead = bus.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].queue, "q");
        assert_eq!(dead[0].attempts, 2);
    }

    #[test]
    fn reject_dead_letters_immediately() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe(Binding::new("q", ["#"]));
        bus.publish(env("job.hot")).unwrap();

        sub.try_recv().unwrap().reject("undecodable payload");

        assert!(sub.try_recv().is_err());
        assert_eq!(bus.dead_letters()[0].reason, "undecodable payload");
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe(Binding::new("q", ["#"]));
        drop(sub);
        bus.publish(env("job.hot")).unwrap();
        assert_eq!(bus.queues.lock().unwrap().len(), 0);
    }

    #[test]
    fn dropping_the_bus_disconnects_subscribers_after_backlog() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe(Binding::new("q", ["#"]));
        bus.publish(env("job.hot")).unwrap();
        drop(bus);

        // Queued deliveries are still handed out, then the channel reports closed.
        let pending = sub.try_recv().unwrap();
        assert!(matches!(sub.try_recv(), Err(mpsc::TryRecvError::Disconnected)));

        // Requeueing into a dropped queue is a logged no-op.
        pending.nack();
        assert!(matches!(sub.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
    }
}
