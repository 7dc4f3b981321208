//! Application services: authorization, admission control and the writes that
//! produce integration events.

pub mod applications;
pub mod jobs;
pub mod saved_jobs;

pub use applications::{ApplicationService, StatusUpdate, TaskQueueTrigger, TrendingTrigger};
pub use jobs::JobService;
pub use saved_jobs::SavedJobService;

#[cfg(test)]
pub(crate) mod testing {
    //! Wiring shared by service-level tests.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use jobmesh_auth::{Actor, Role};
    use jobmesh_core::{CompanyId, UserId};
    use jobmesh_events::{Binding, EventBus, EventEnvelope, InMemoryEventBus, IntegrationEvent, Subscription};
    use jobmesh_jobs::{Job, JobDraft, SubscriptionSnapshot};

    use super::*;
    use crate::cache::{InMemorySubscriptionCache, SubscriptionCache};
    use crate::store::{InMemoryApplicationStore, InMemoryJobStore, InMemorySavedJobStore};
    use crate::tasks::InMemoryTaskStore;

    pub type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;

    pub struct Harness {
        pub bus: Arc<Bus>,
        pub job_store: Arc<InMemoryJobStore>,
        pub application_store: Arc<InMemoryApplicationStore>,
        pub saved_store: Arc<InMemorySavedJobStore>,
        pub cache: Arc<InMemorySubscriptionCache>,
        pub tasks: Arc<InMemoryTaskStore>,
        pub jobs: JobService,
        pub applications: ApplicationService,
        pub saved_jobs: SavedJobService,
        tap: Mutex<Subscription<EventEnvelope<JsonValue>>>,
        seen: Mutex<Vec<IntegrationEvent>>,
    }

    impl Harness {
        pub fn new() -> Self {
            let bus = Arc::new(Bus::new());
            let tap = bus.subscribe(Binding::new("test.tap", ["#"]));
            let job_store = Arc::new(InMemoryJobStore::new());
            let application_store = Arc::new(InMemoryApplicationStore::new());
            let saved_store = Arc::new(InMemorySavedJobStore::new());
            let cache = Arc::new(InMemorySubscriptionCache::new());
            let tasks = Arc::new(InMemoryTaskStore::new());

            let jobs = JobService::new(
                job_store.clone(),
                application_store.clone(),
                saved_store.clone(),
                cache.clone(),
                bus.clone(),
            );
            let applications = ApplicationService::new(
                job_store.clone(),
                application_store.clone(),
                bus.clone(),
                Arc::new(TaskQueueTrigger::new(tasks.clone(), Duration::from_millis(10))),
            );
            let saved_jobs = SavedJobService::new(job_store.clone(), saved_store.clone(), bus.clone());

            Self {
                bus,
                job_store,
                application_store,
                saved_store,
                cache,
                tasks,
                jobs,
                applications,
                saved_jobs,
                tap: Mutex::new(tap),
                seen: Mutex::new(Vec::new()),
            }
        }

        /// A company with a cached plan.
        pub fn company(&self, jobs: u32, featured: u32) -> CompanyId {
            let company = CompanyId::new();
            self.set_plan(company, jobs, featured);
            company
        }

        pub fn set_plan(&self, company: CompanyId, jobs: u32, featured: u32) {
            let snapshot = SubscriptionSnapshot {
                plan: Default::default(),
                billing_cycle: Default::default(),
                start_date: None,
                end_date: Some(Utc::now() + chrono::Duration::days(30)),
                job_post_limit: jobs,
                featured_jobs_limit: featured,
            };
            self.cache.put(company, &snapshot).unwrap();
        }

        /// Create and approve.
        pub fn published_job(&self, company: CompanyId, poster: &Actor, title: &str) -> Job {
            let now = Utc::now();
            let job = self.jobs.create_job(draft(company, title), poster, now).unwrap();
            self.jobs.approve(job.id_typed(), &admin(), now).unwrap()
        }

        /// Every event published since the last `clear_published`, in order.
        pub fn published(&self) -> Vec<IntegrationEvent> {
            let tap = self.tap.lock().unwrap();
            let mut seen = self.seen.lock().unwrap();
            while let Ok(delivery) = tap.try_recv() {
                let event = IntegrationEvent::from_envelope(delivery.message()).unwrap();
                seen.push(event.into_payload());
                delivery.ack();
            }
            seen.clone()
        }

        pub fn clear_published(&self) {
            self.published();
            self.seen.lock().unwrap().clear();
        }
    }

    pub fn draft(company: CompanyId, title: &str) -> JobDraft {
        JobDraft {
            title: Some(title.to_string()),
            description: Some("Design and operate event-driven services".into()),
            company: Some(company),
            company_name: Some("Acme".into()),
            location: Some("Remote".into()),
            salary: Some(120_000),
            experience: Some("3+ years".into()),
            skills: Some(vec!["rust".into(), "kafka".into()]),
            job_type: Some("Full-time".into()),
            benefits: Some(vec!["remote".into()]),
            category: Some("engineering".into()),
            application_deadline: Some(Utc::now() + chrono::Duration::days(30)),
            is_featured: false,
        }
    }

    pub fn recruiter(company: CompanyId) -> Actor {
        Actor::new(UserId::new(), Role::Recruiter).with_company(company)
    }

    pub fn applicant() -> Actor {
        Actor::new(UserId::new(), Role::Applicant)
    }

    pub fn admin() -> Actor {
        Actor::new(UserId::new(), Role::Admin)
    }
}
