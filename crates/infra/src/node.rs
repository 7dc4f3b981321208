//! Single-process wiring: stores, services, consumers and background workers
//! over one shared bus.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use jobmesh_events::{EventBus, EventEnvelope};

use crate::cache::{SubscriptionCache, SubscriptionCacheConsumer};
use crate::config::AppConfig;
use crate::notifications::{
    InMemoryDeviceTokenStore, InMemoryNotificationStore, NotificationConsumer,
    NotificationDispatcher, NotificationInbox, PushProvider,
};
use crate::publisher::Publisher;
use crate::search::{InMemorySearchIndex, SearchProjection, SearchService};
use crate::services::{ApplicationService, JobService, SavedJobService, TaskQueueTrigger};
use crate::store::{InMemoryApplicationStore, InMemoryJobStore, InMemorySavedJobStore};
use crate::tasks::{InMemoryTaskStore, TaskExecutor, TaskExecutorConfig, TaskExecutorHandle};
use crate::trending::TrendingService;
use crate::workers::{ConsumerWorker, DailyScheduler, WorkerHandle};

pub type SearchIndexHandle = Arc<InMemorySearchIndex>;

/// Everything a node serves requests with.
pub struct Node<B> {
    config: AppConfig,
    bus: Arc<B>,
    tasks: Arc<InMemoryTaskStore>,
    pub jobs: Arc<JobService>,
    pub applications: Arc<ApplicationService>,
    pub saved_jobs: Arc<SavedJobService>,
    pub search: Arc<SearchService<SearchIndexHandle>>,
    pub inbox: Arc<NotificationInbox>,
    pub trending: Arc<TrendingService>,
    search_projection: Arc<SearchProjection<SearchIndexHandle>>,
    cache_consumer: Arc<SubscriptionCacheConsumer<Arc<dyn SubscriptionCache>>>,
    notification_consumer: Arc<NotificationConsumer>,
}

/// Running background threads. Dropping without [`Workers::shutdown`] leaves
/// them running until the process exits.
pub struct Workers {
    consumers: Vec<WorkerHandle>,
    executor: TaskExecutorHandle,
    scheduler: WorkerHandle,
}

impl Workers {
    pub fn consumer_names(&self) -> Vec<&str> {
        self.consumers.iter().map(WorkerHandle::name).collect()
    }

    pub fn shutdown(self) {
        self.scheduler.shutdown();
        self.executor.shutdown();
        for consumer in self.consumers {
            consumer.shutdown();
        }
        info!("workers stopped");
    }
}

impl<B> Node<B>
where
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(
        config: AppConfig,
        bus: Arc<B>,
        cache: Arc<dyn SubscriptionCache>,
        push: Arc<dyn PushProvider>,
    ) -> Self {
        let publisher: Arc<dyn Publisher> = bus.clone();
        let job_store = Arc::new(InMemoryJobStore::new());
        let application_store = Arc::new(InMemoryApplicationStore::new());
        let saved_store = Arc::new(InMemorySavedJobStore::new());
        let notification_store = Arc::new(InMemoryNotificationStore::new());
        let token_store = Arc::new(InMemoryDeviceTokenStore::new());
        let tasks = Arc::new(InMemoryTaskStore::new());
        let index: SearchIndexHandle = Arc::new(InMemorySearchIndex::new());

        let jobs = JobService::new(
            job_store.clone(),
            application_store.clone(),
            saved_store.clone(),
            cache.clone(),
            publisher.clone(),
        );
        let applications = ApplicationService::new(
            job_store.clone(),
            application_store.clone(),
            publisher.clone(),
            Arc::new(TaskQueueTrigger::new(tasks.clone(), config.trending_delay)),
        );
        let saved_jobs = SavedJobService::new(job_store.clone(), saved_store, publisher.clone());
        let trending = TrendingService::new(
            job_store,
            application_store,
            publisher,
            config.trending_policy(),
        )
        .with_notification_store(notification_store.clone());

        let dispatcher = NotificationDispatcher::new(
            notification_store.clone(),
            token_store.clone(),
            push,
            config.frontend_url.clone(),
            config.notification_ttl(),
        );

        Self {
            bus,
            tasks,
            jobs: Arc::new(jobs),
            applications: Arc::new(applications),
            saved_jobs: Arc::new(saved_jobs),
            search: Arc::new(SearchService::new(index.clone())),
            inbox: Arc::new(NotificationInbox::new(notification_store, token_store)),
            trending: Arc::new(trending),
            search_projection: Arc::new(SearchProjection::new(index)),
            cache_consumer: Arc::new(SubscriptionCacheConsumer::new(cache)),
            notification_consumer: Arc::new(NotificationConsumer::new(Arc::new(dispatcher))),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<B> {
        &self.bus
    }

    pub fn search_projection(&self) -> &SearchProjection<SearchIndexHandle> {
        &self.search_projection
    }

    /// Bind every consumer queue, then start the task executor and the daily
    /// sweep. Queues are bound before this returns.
    pub fn start(&self) -> std::io::Result<Workers> {
        let consumers = vec![
            ConsumerWorker::spawn(self.bus.as_ref(), self.cache_consumer.clone())?,
            ConsumerWorker::spawn(self.bus.as_ref(), self.search_projection.clone())?,
            ConsumerWorker::spawn(self.bus.as_ref(), self.notification_consumer.clone())?,
        ];

        let mut executor = TaskExecutor::new(self.tasks.clone());
        self.trending.clone().register(&mut executor);
        let executor = executor.spawn(TaskExecutorConfig::default().with_name("trending-tasks"))?;

        let trending = self.trending.clone();
        let scheduler = DailyScheduler::spawn("daily-sweep", self.config.sweep_hour_utc, move |now| {
            trending.run_daily(now);
        })?;

        info!(consumers = consumers.len(), sweep_hour_utc = self.config.sweep_hour_utc, "workers started");
        Ok(Workers {
            consumers,
            executor,
            scheduler,
        })
    }
}
