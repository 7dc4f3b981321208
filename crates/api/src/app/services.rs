//! Node wiring for the HTTP layer.

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tracing::info;

use jobmesh_events::{EventBus, EventEnvelope, InMemoryEventBus};
use jobmesh_infra::cache::InMemorySubscriptionCache;
use jobmesh_infra::node::SearchIndexHandle;
use jobmesh_infra::notifications::{LoggingPushProvider, NotificationInbox};
use jobmesh_infra::publisher::Publisher;
use jobmesh_infra::search::SearchService;
use jobmesh_infra::services::{ApplicationService, JobService, SavedJobService};
use jobmesh_infra::trending::TrendingService;
use jobmesh_infra::{AppConfig, Node, Workers};

/// Services shared by every handler, plus the background workers they feed.
pub struct AppServices {
    pub jobs: Arc<JobService>,
    pub applications: Arc<ApplicationService>,
    pub saved_jobs: Arc<SavedJobService>,
    pub search: Arc<SearchService<SearchIndexHandle>>,
    pub inbox: Arc<NotificationInbox>,
    pub trending: Arc<TrendingService>,
    publisher: Arc<dyn Publisher>,
    workers: Mutex<Option<Workers>>,
}

impl AppServices {
    /// Start the node's workers and keep its services.
    pub fn start<B>(node: Node<B>) -> std::io::Result<Self>
    where
        B: EventBus<EventEnvelope<JsonValue>> + 'static,
    {
        let workers = node.start()?;
        info!(consumers = ?workers.consumer_names(), "node started");
        let publisher: Arc<dyn Publisher> = node.bus().clone();
        Ok(Self {
            jobs: node.jobs.clone(),
            applications: node.applications.clone(),
            saved_jobs: node.saved_jobs.clone(),
            search: node.search.clone(),
            inbox: node.inbox.clone(),
            trending: node.trending.clone(),
            publisher,
            workers: Mutex::new(Some(workers)),
        })
    }

    /// Publisher onto the node's bus, for events produced by other components.
    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    /// Stop background workers. Later calls do nothing.
    pub fn shutdown(&self) {
        let workers = self.workers.lock().ok().and_then(|mut w| w.take());
        if let Some(workers) = workers {
            workers.shutdown();
        }
    }
}

/// Single-process node over the in-memory bus and cache.
pub fn build_in_memory(config: AppConfig) -> std::io::Result<AppServices> {
    let bus = Arc::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::with_max_deliveries(
        config.max_redeliveries,
    ));
    let node = Node::new(
        config,
        bus,
        Arc::new(InMemorySubscriptionCache::new()),
        Arc::new(LoggingPushProvider),
    );
    AppServices::start(node)
}

#[cfg(feature = "redis")]
pub fn build_redis(config: AppConfig) -> anyhow::Result<AppServices> {
    use jobmesh_infra::cache::RedisSubscriptionCache;
    use jobmesh_infra::event_bus::RedisStreamsEventBus;
    use jobmesh_infra::startup::connect_with_retry;

    let bus = connect_with_retry("redis-streams", config.startup_retries, config.startup_retry_delay, || {
        let bus = RedisStreamsEventBus::new(&config.redis_url, config.stream_key.clone())?
            .with_max_redeliveries(config.max_redeliveries);
        bus.ping().map(|()| bus)
    })?;
    let cache = connect_with_retry("redis-cache", config.startup_retries, config.startup_retry_delay, || {
        let cache = RedisSubscriptionCache::new(&config.redis_url)?;
        cache.ping().map(|()| cache)
    })?;

    let node = Node::new(config, Arc::new(bus), Arc::new(cache), Arc::new(LoggingPushProvider));
    Ok(AppServices::start(node)?)
}
