//! Redis Streams-backed topic exchange (durable, at-least-once delivery).
//!
//! - **Stream**: one stream (`jobmesh:events` by default) carries every event; the
//!   routing key is stored as an entry field next to the JSON envelope.
//! - **Queues**: each [`Binding`] queue is a consumer group; entries that don't
//!   match the binding's patterns are acknowledged and skipped by that group.
//! - **Redelivery**: a nacked entry stays in the group's pending list and is read
//!   again (`XREADGROUP ... 0`) until `max_redeliveries`.
//! - **Dead letters**: `<stream>:dlq`, written on reject or exhausted redeliveries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use jobmesh_events::{Acknowledger, Binding, Delivery, EventBus, EventEnvelope, Subscription};

pub const DEFAULT_STREAM_KEY: &str = "jobmesh:events";

const DEFAULT_MAX_REDELIVERIES: u32 = 5;
const DEFAULT_BLOCK_MS: u64 = 1_000;
const READ_COUNT: usize = 16;

#[derive(Debug, Error)]
pub enum RedisStreamsError {
    #[error("redis connection error: {0}")]
    Connection(String),

    #[error("redis command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed stream entry: {0}")]
    Deserialization(String),
}

#[derive(Debug, Clone)]
pub struct RedisStreamsEventBus {
    client: Arc<redis::Client>,
    stream_key: String,
    dlq_key: String,
    max_redeliveries: u32,
    block_ms: u64,
}

impl RedisStreamsEventBus {
    pub fn new(redis_url: impl AsRef<str>, stream_key: impl Into<String>) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        let stream_key = stream_key.into();

        Ok(Self {
            client: Arc::new(client),
            dlq_key: format!("{stream_key}:dlq"),
            stream_key,
            max_redeliveries: DEFAULT_MAX_REDELIVERIES,
            block_ms: DEFAULT_BLOCK_MS,
        })
    }

    pub fn with_max_redeliveries(mut self, max: u32) -> Self {
        self.max_redeliveries = max.max(1);
        self
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    pub fn dlq_key(&self) -> &str {
        &self.dlq_key
    }

    fn connection(&self) -> Result<redis::Connection, RedisStreamsError> {
        self.client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))
    }

    /// Round-trip check used by startup retry.
    pub fn ping(&self) -> Result<(), RedisStreamsError> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("PING failed: {e}")))?;
        Ok(())
    }

    /// Create the consumer group (and the stream) if missing.
    pub fn ensure_group(&self, group: &str) -> Result<(), RedisStreamsError> {
        let mut conn = self.connection()?;
        let created: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query(&mut conn);

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(RedisStreamsError::Command(format!("XGROUP CREATE failed: {e}"))),
        }
    }

    #[instrument(skip(self, message), fields(stream_key = %self.stream_key, routing_key = %message.routing_key()), err)]
    fn publish_sync(&self, message: &EventEnvelope<JsonValue>) -> Result<(), RedisStreamsError> {
        let envelope = serde_json::to_string(message)
            .map_err(|e| RedisStreamsError::Serialization(e.to_string()))?;
        let mut conn = self.connection()?;

        let _: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg("routing_key")
            .arg(message.routing_key())
            .arg("event_id")
            .arg(message.event_id().to_string())
            .arg("envelope")
            .arg(envelope)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("XADD failed: {e}")))?;
        Ok(())
    }

    fn read_group(
        &self,
        conn: &mut redis::Connection,
        group: &str,
        consumer: &str,
        start: &str,
    ) -> Result<Vec<StreamEntry>, RedisStreamsError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer).arg("COUNT").arg(READ_COUNT);
        // Only block when waiting for new entries; the pending list answers immediately.
        if start == ">" {
            cmd.arg("BLOCK").arg(self.block_ms);
        }
        cmd.arg("STREAMS").arg(&self.stream_key).arg(start);

        let reply: redis::Value = cmd
            .query(conn)
            .map_err(|e| RedisStreamsError::Command(format!("XREADGROUP failed: {e}")))?;
        parse_read_reply(reply)
    }
}

/// One entry of an `XREADGROUP` reply. `fields` is empty when the entry was
/// trimmed from the stream while still pending.
#[derive(Debug, Clone, PartialEq)]
struct StreamEntry {
    id: String,
    fields: HashMap<String, String>,
}

fn value_to_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::Data(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::Status(s) => Some(s.clone()),
        _ => None,
    }
}

/// `[[stream, [[id, [k, v, ...]], ...]], ...]`, or nil on block timeout.
fn parse_read_reply(reply: redis::Value) -> Result<Vec<StreamEntry>, RedisStreamsError> {
    let streams = match reply {
        redis::Value::Nil => return Ok(Vec::new()),
        redis::Value::Bulk(streams) => streams,
        other => {
            return Err(RedisStreamsError::Deserialization(format!(
                "unexpected XREADGROUP reply: {other:?}"
            )));
        }
    };

    let mut entries = Vec::new();
    for stream in streams {
        let redis::Value::Bulk(parts) = stream else {
            return Err(RedisStreamsError::Deserialization("stream reply is not an array".into()));
        };
        let Some(redis::Value::Bulk(raw_entries)) = parts.into_iter().nth(1) else {
            continue;
        };
        for raw in raw_entries {
            entries.push(parse_entry(raw)?);
        }
    }
    Ok(entries)
}

fn parse_entry(raw: redis::Value) -> Result<StreamEntry, RedisStreamsError> {
    let redis::Value::Bulk(parts) = raw else {
        return Err(RedisStreamsError::Deserialization("entry is not an array".into()));
    };
    let mut parts = parts.into_iter();
    let id = parts
        .next()
        .as_ref()
        .and_then(value_to_string)
        .ok_or_else(|| RedisStreamsError::Deserialization("entry without id".into()))?;

    let mut fields = HashMap::new();
    if let Some(redis::Value::Bulk(kv)) = parts.next() {
        for pair in kv.chunks(2) {
            if let [k, v] = pair {
                if let (Some(k), Some(v)) = (value_to_string(k), value_to_string(v)) {
                    fields.insert(k, v);
                }
            }
        }
    }
    Ok(StreamEntry { id, fields })
}

#[derive(Debug, Default)]
struct AckState {
    /// Handed to the consumer, not yet settled.
    in_flight: HashSet<String>,
    /// Deliveries so far per entry id.
    attempts: HashMap<String, u32>,
}

/// Settles deliveries of one consumer group.
struct StreamAcker {
    client: Arc<redis::Client>,
    stream_key: String,
    dlq_key: String,
    group: String,
    max_redeliveries: u32,
    state: Mutex<AckState>,
}

impl StreamAcker {
    fn xack(&self, id: &str) -> Result<(), RedisStreamsError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        let _: u64 = redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(id)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("XACK failed: {e}")))?;
        Ok(())
    }

    fn dead_letter_raw(&self, id: &str, envelope: &str, attempts: u32, reason: &str) -> Result<(), RedisStreamsError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;
        let _: String = redis::cmd("XADD")
            .arg(&self.dlq_key)
            .arg("*")
            .arg("queue")
            .arg(&self.group)
            .arg("original_id")
            .arg(id)
            .arg("attempts")
            .arg(attempts)
            .arg("reason")
            .arg(reason)
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("envelope")
            .arg(envelope)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("DLQ XADD failed: {e}")))?;
        Ok(())
    }

    /// Dead-letter then acknowledge, so the group stops redelivering.
    fn bury(&self, id: &str, envelope: &str, attempts: u32, reason: &str) {
        error!(queue = %self.group, entry_id = %id, attempts, reason, "message dead-lettered");
        if let Err(e) = self.dead_letter_raw(id, envelope, attempts, reason) {
            // Leave it pending: better redelivered than lost.
            error!(queue = %self.group, entry_id = %id, error = %e, "dead-letter write failed");
            return;
        }
        if let Err(e) = self.xack(id) {
            error!(queue = %self.group, entry_id = %id, error = %e, "XACK after dead-letter failed");
        }
        self.forget(id);
    }

    fn forget(&self, id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.in_flight.remove(id);
            state.attempts.remove(id);
        }
    }

    /// Record a new delivery; `None` if the entry is already in flight.
    fn begin(&self, id: &str) -> Option<u32> {
        let mut state = self.state.lock().ok()?;
        if !state.in_flight.insert(id.to_string()) {
            return None;
        }
        let attempt = state.attempts.entry(id.to_string()).or_insert(0);
        *attempt += 1;
        Some(*attempt)
    }
}

impl Acknowledger<EventEnvelope<JsonValue>> for StreamAcker {
    fn ack(&self, tag: &str) {
        if let Err(e) = self.xack(tag) {
            // Stays pending and will be redelivered; consumers are idempotent.
            warn!(queue = %self.group, entry_id = %tag, error = %e, "XACK failed");
            if let Ok(mut state) = self.state.lock() {
                state.in_flight.remove(tag);
            }
            return;
        }
        self.forget(tag);
    }

    fn nack(self: Arc<Self>, tag: String, message: EventEnvelope<JsonValue>, attempt: u32) {
        if attempt >= self.max_redeliveries {
            let raw = serde_json::to_string(&message).unwrap_or_default();
            self.bury(&tag, &raw, attempt, "max redeliveries reached");
            return;
        }
        debug!(queue = %self.group, entry_id = %tag, attempt, "entry left pending for redelivery");
        if let Ok(mut state) = self.state.lock() {
            state.in_flight.remove(&tag);
        }
    }

    fn reject(&self, tag: &str, message: EventEnvelope<JsonValue>, attempt: u32, reason: &str) {
        let raw = serde_json::to_string(&message).unwrap_or_default();
        self.bury(tag, &raw, attempt, reason);
    }
}

impl EventBus<EventEnvelope<JsonValue>> for RedisStreamsEventBus {
    type Error = RedisStreamsError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        self.publish_sync(&message)
    }

    fn subscribe(&self, binding: Binding) -> Subscription<EventEnvelope<JsonValue>> {
        let (tx, rx) = mpsc::channel();
        let group = binding.queue().to_string();

        if let Err(e) = self.ensure_group(&group) {
            error!(queue = %group, error = %e, "failed to create consumer group");
        }

        let acker = Arc::new(StreamAcker {
            client: self.client.clone(),
            stream_key: self.stream_key.clone(),
            dlq_key: self.dlq_key.clone(),
            group: group.clone(),
            max_redeliveries: self.max_redeliveries,
            state: Mutex::new(AckState::default()),
        });

        let bus = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("stream-{group}"))
            .spawn(move || poll_loop(bus, binding, acker, tx));
        if let Err(e) = spawned {
            error!(queue = %group, error = %e, "failed to spawn stream poller");
        }

        Subscription::new(rx)
    }
}

fn poll_loop(
    bus: RedisStreamsEventBus,
    binding: Binding,
    acker: Arc<StreamAcker>,
    tx: mpsc::Sender<Delivery<EventEnvelope<JsonValue>>>,
) {
    let group = binding.queue().to_string();
    // Stable per queue so a restarted process picks up its own pending entries.
    let consumer = format!("{group}-consumer");
    let backoff = Duration::from_millis(500);
    let mut conn: Option<redis::Connection> = None;

    info!(queue = %group, stream_key = %bus.stream_key, "stream poller started");

    loop {
        if conn.is_none() {
            match bus.connection() {
                Ok(c) => conn = Some(c),
                Err(e) => {
                    warn!(queue = %group, error = %e, "stream connection failed, retrying");
                    thread::sleep(backoff);
                    continue;
                }
            }
        }
        let Some(c) = conn.as_mut() else {
            continue;
        };

        let pending = match bus.read_group(c, &group, &consumer, "0") {
            Ok(entries) => entries,
            Err(e) => {
                warn!(queue = %group, error = %e, "reading pending entries failed");
                conn = None;
                thread::sleep(backoff);
                continue;
            }
        };

        let mut batch: Vec<StreamEntry> = pending
            .into_iter()
            .filter(|entry| acker.state.lock().is_ok_and(|s| !s.in_flight.contains(&entry.id)))
            .collect();

        if batch.is_empty() {
            batch = match bus.read_group(c, &group, &consumer, ">") {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(queue = %group, error = %e, "reading new entries failed");
                    conn = None;
                    thread::sleep(backoff);
                    continue;
                }
            };
        }

        for entry in batch {
            if !dispatch(&binding, &acker, &tx, entry) {
                info!(queue = %group, "subscription dropped, stream poller stopping");
                return;
            }
        }
    }
}

/// Hand one entry to the consumer. Returns `false` once the receiver is gone.
fn dispatch(
    binding: &Binding,
    acker: &Arc<StreamAcker>,
    tx: &mpsc::Sender<Delivery<EventEnvelope<JsonValue>>>,
    entry: StreamEntry,
) -> bool {
    let routing_key = entry.fields.get("routing_key").map(String::as_str).unwrap_or("");
    let Some(raw) = entry.fields.get("envelope") else {
        // Trimmed from the stream while pending; nothing left to deliver.
        if let Err(e) = acker.xack(&entry.id) {
            warn!(queue = %binding.queue(), entry_id = %entry.id, error = %e, "XACK of empty entry failed");
        }
        return true;
    };

    if !binding.matches(routing_key) {
        if let Err(e) = acker.xack(&entry.id) {
            warn!(queue = %binding.queue(), entry_id = %entry.id, error = %e, "XACK of unbound entry failed");
        }
        return true;
    }

    let Some(attempt) = acker.begin(&entry.id) else {
        return true;
    };

    let envelope: EventEnvelope<JsonValue> = match serde_json::from_str(raw) {
        Ok(env) => env,
        Err(e) => {
            acker.bury(&entry.id, raw, attempt, &format!("undecodable envelope: {e}"));
            return true;
        }
    };

    let acknowledger: Arc<dyn Acknowledger<EventEnvelope<JsonValue>>> = acker.clone();
    tx.send(Delivery::new(envelope, attempt, entry.id, acknowledger)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> redis::Value {
        redis::Value::Data(s.as_bytes().to_vec())
    }

    #[test]
    fn parses_xreadgroup_reply() {
        let reply = redis::Value::Bulk(vec![redis::Value::Bulk(vec![
            data("jobmesh:events"),
            redis::Value::Bulk(vec![
                redis::Value::Bulk(vec![
                    data("1-0"),
                    redis::Value::Bulk(vec![data("routing_key"), data("job.hot"), data("envelope"), data("{}")]),
                ]),
                redis::Value::Bulk(vec![data("2-0"), redis::Value::Nil]),
            ]),
        ])]);

        let entries = parse_read_reply(reply).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "1-0");
        assert_eq!(entries[0].fields.get("routing_key").map(String::as_str), Some("job.hot"));
        assert!(entries[1].fields.is_empty());
    }

    #[test]
    fn block_timeout_is_empty() {
        assert!(parse_read_reply(redis::Value::Nil).unwrap().is_empty());
    }

    #[test]
    fn dlq_key_follows_stream() {
        let bus = RedisStreamsEventBus::new("redis://127.0.0.1:6379", "market:events").unwrap();
        assert_eq!(bus.dlq_key(), "market:events:dlq");
    }
}
