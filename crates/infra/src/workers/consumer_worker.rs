//! Acknowledge-after-success consumer loop.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use jobmesh_events::{Binding, Delivery, EventBus, EventEnvelope, EventHandler, IntegrationEvent};

use super::WorkerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked,
    /// Handler failed; the bus will redeliver or dead-letter.
    Nacked,
    /// Undecodable; dead-lettered immediately.
    Rejected,
}

/// Decode, handle, settle. Exactly one of ack/nack/reject is called.
pub fn process_delivery<H>(handler: &H, delivery: Delivery<EventEnvelope<JsonValue>>) -> DeliveryOutcome
where
    H: EventHandler + ?Sized,
{
    let envelope = match IntegrationEvent::from_envelope(delivery.message()) {
        Ok(env) => env,
        Err(e) => {
            warn!(
                worker = handler.name(),
                routing_key = %delivery.message().routing_key(),
                error = %e,
                "undecodable event rejected"
            );
            delivery.reject(&e.to_string());
            return DeliveryOutcome::Rejected;
        }
    };

    match handler.handle(&envelope) {
        Ok(()) => {
            debug!(
                worker = handler.name(),
                routing_key = %envelope.routing_key(),
                event_id = %envelope.event_id(),
                "event handled"
            );
            delivery.ack();
            DeliveryOutcome::Acked
        }
        Err(err) => {
            warn!(
                worker = handler.name(),
                routing_key = %envelope.routing_key(),
                event_id = %envelope.event_id(),
                attempt = delivery.attempt(),
                error = %err,
                "event handler failed"
            );
            delivery.nack();
            DeliveryOutcome::Nacked
        }
    }
}

/// Runs one [`EventHandler`] against its own queue.
#[derive(Debug)]
pub struct ConsumerWorker;

impl ConsumerWorker {
    /// Bind the handler's queue and spawn the consumer thread.
    ///
    /// The queue is bound before this returns, so events published afterwards
    /// are never missed.
    pub fn spawn<B, H>(bus: &B, handler: H) -> std::io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
        H: EventHandler + 'static,
    {
        let name = handler.name();
        let sub = bus.subscribe(Binding::new(name, handler.bindings()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                info!(worker = name, "consumer started");
                let tick = Duration::from_millis(250);
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    match sub.recv_timeout(tick) {
                        Ok(delivery) => {
                            process_delivery(&handler, delivery);
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!(worker = name, "consumer stopped");
            })?;

        Ok(WorkerHandle::new(name.to_string(), shutdown_tx, join))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicU32, Ordering};

    use jobmesh_core::JobId;
    use jobmesh_events::integration::{JobStatus, JobStatusChanged};
    use jobmesh_events::{HandlerError, InMemoryEventBus};

    /// Fails the first `failures` calls.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        seen: Mutex<Vec<String>>,
    }

    impl EventHandler for Flaky {
        fn name(&self) -> &'static str {
            "test.flaky"
        }

        fn bindings(&self) -> Vec<&'static str> {
            vec!["job.status.changed"]
        }

        fn handle(&self, envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(HandlerError::Dependency("store down".into()));
            }
            self.seen.lock().unwrap().push(envelope.routing_key().to_string());
            Ok(())
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Counts handled events through a shared counter.
    struct Counting(Arc<AtomicU32>);

    impl EventHandler for Counting {
        fn name(&self) -> &'static str {
            "test.counting"
        }

        fn bindings(&self) -> Vec<&'static str> {
            vec!["job.status.changed"]
        }

        fn handle(&self, _envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn status_changed() -> EventEnvelope<JsonValue> {
        IntegrationEvent::JobStatusChanged(JobStatusChanged {
            job_id: JobId::new(),
            slug: "backend-engineer".into(),
            status: JobStatus::Closed,
        })
        .to_envelope()
        .unwrap()
    }

    #[test]
    fn failed_delivery_is_redelivered_until_handled() {
        let bus: InMemoryEventBus<EventEnvelope<JsonValue>> = InMemoryEventBus::new();
        let handler = flaky(2);
        let sub = bus.subscribe(Binding::new(handler.name(), handler.bindings()));
        bus.publish(status_changed()).unwrap();

        assert_eq!(process_delivery(&handler, sub.try_recv().unwrap()), DeliveryOutcome::Nacked);
        assert_eq!(process_delivery(&handler, sub.try_recv().unwrap()), DeliveryOutcome::Nacked);
        let third = sub.try_recv().unwrap();
        assert_eq!(third.attempt(), 3);
        assert_eq!(process_delivery(&handler, third), DeliveryOutcome::Acked);

        assert!(sub.try_recv().is_err());
        assert_eq!(handler.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn exhausted_redeliveries_dead_letter() {
        let bus: InMemoryEventBus<EventEnvelope<JsonValue>> = InMemoryEventBus::with_max_deliveries(2);
        let handler = flaky(u32::MAX);
        let sub = bus.subscribe(Binding::new(handler.name(), handler.bindings()));
        bus.publish(status_changed()).unwrap();

        process_delivery(&handler, sub.try_recv().unwrap());
        process_delivery(&handler, sub.try_recv().unwrap());

        assert!(sub.try_recv().is_err());
        assert_eq!(bus.dead_letters().len(), 1);
    }

    #[test]
    fn undecodable_payload_is_rejected() {
        let bus: InMemoryEventBus<EventEnvelope<JsonValue>> = InMemoryEventBus::new();
        let handler = flaky(0);
        let sub = bus.subscribe(Binding::new(handler.name(), handler.bindings()));
        bus.publish(EventEnvelope::new("job.status.changed", serde_json::json!({"slug": 7})))
            .unwrap();

        assert_eq!(process_delivery(&handler, sub.try_recv().unwrap()), DeliveryOutcome::Rejected);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.dead_letters()[0].attempts, 1);
    }

    #[test]
    fn consumer_stops_once_the_bus_is_dropped() {
        let bus: InMemoryEventBus<EventEnvelope<JsonValue>> = InMemoryEventBus::new();
        let handled = Arc::new(AtomicU32::new(0));
        let worker = ConsumerWorker::spawn(&bus, Counting(handled.clone())).unwrap();
        bus.publish(status_changed()).unwrap();
        drop(bus);

        for _ in 0..200 {
            if worker.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.is_finished());
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        worker.shutdown();
    }
}
