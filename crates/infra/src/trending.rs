//! Hot promotion and the daily expiry sweep.
//!
//! The scheduled sweep and the per-application check share one
//! [`TrendingPolicy`] and the same guarded promotion, so whichever runs first
//! wins and the other becomes a no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use jobmesh_core::{ExpectedVersion, JobId};
use jobmesh_jobs::outbound::integration_events;
use jobmesh_jobs::{Job, JobCommand, JobStatus, JobTransition, PromoteHot, TrendingPolicy};

use crate::error::{ServiceError, ServiceResult};
use crate::notifications::NotificationRepository;
use crate::publisher::Publisher;
use crate::store::{ApplicationRepository, JobFilter, JobRepository};
use crate::tasks::{TaskExecutor, TaskKind, TaskResult, TaskStore};

/// What one daily run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub promoted: usize,
    pub demoted: usize,
    pub featured_expired: usize,
    pub expired: usize,
    pub notifications_purged: usize,
}

pub struct TrendingService {
    jobs: Arc<dyn JobRepository>,
    applications: Arc<dyn ApplicationRepository>,
    publisher: Arc<dyn Publisher>,
    policy: TrendingPolicy,
    notifications: Option<Arc<dyn NotificationRepository>>,
}

impl TrendingService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        applications: Arc<dyn ApplicationRepository>,
        publisher: Arc<dyn Publisher>,
        policy: TrendingPolicy,
    ) -> Self {
        Self {
            jobs,
            applications,
            publisher,
            policy,
            notifications: None,
        }
    }

    /// Also purge expired notifications during the daily run.
    pub fn with_notification_store(mut self, notifications: Arc<dyn NotificationRepository>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn policy(&self) -> TrendingPolicy {
        self.policy
    }

    /// Promote every published job whose recent application count reaches the
    /// threshold. Returns how many jobs turned hot.
    pub fn promote_trending(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let counts = self.applications.counts_since(self.policy.window_start(now))?;
        let mut promoted = 0;
        for (job_id, count) in counts {
            if !self.policy.qualifies(count) {
                continue;
            }
            match self.promote(job_id, now) {
                Ok(true) => promoted += 1,
                Ok(false) => {}
                Err(e) => warn!(job_id = %job_id, error = %e, "hot promotion failed"),
            }
        }
        Ok(promoted)
    }

    /// Evaluate a single job, as scheduled after an application.
    pub fn check_job(&self, job_id: JobId, now: DateTime<Utc>) -> ServiceResult<bool> {
        let count = self
            .applications
            .count_for_job_since(job_id, self.policy.window_start(now))?;
        if !self.policy.qualifies(count) {
            return Ok(false);
        }
        self.promote(job_id, now)
    }

    /// Clear hot flags whose period has ended.
    pub fn demote_expired(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let due = self
            .jobs
            .find(&JobFilter::new().hot(true))?
            .into_iter()
            .filter(|job| job.hot_until().is_some_and(|until| until <= now));
        Ok(self.apply_each(due, |job| {
            JobCommand::ExpireHot(JobTransition::new(job.id_typed(), now))
        }))
    }

    /// Clear featured flags whose expiry has passed.
    pub fn expire_featured(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let due = self
            .jobs
            .find(&JobFilter::new().featured(true))?
            .into_iter()
            .filter(|job| job.featured_expiry().is_some_and(|until| until <= now));
        Ok(self.apply_each(due, |job| {
            JobCommand::ExpireFeatured(JobTransition::new(job.id_typed(), now))
        }))
    }

    /// Move published jobs past their application deadline to `Expired`.
    pub fn expire_past_deadline(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let due = self
            .jobs
            .find(&JobFilter::new().status(JobStatus::Published))?
            .into_iter()
            .filter(|job| job.details().application_deadline < now);
        Ok(self.apply_each(due, |job| {
            JobCommand::Expire(JobTransition::new(job.id_typed(), now))
        }))
    }

    /// The daily pass. A failing step is logged and the remaining steps still run.
    pub fn run_daily(&self, now: DateTime<Utc>) -> SweepReport {
        let report = SweepReport {
            promoted: step("hot promotion", self.promote_trending(now)),
            demoted: step("hot demotion", self.demote_expired(now)),
            featured_expired: step("featured expiry", self.expire_featured(now)),
            expired: step("deadline expiry", self.expire_past_deadline(now)),
            notifications_purged: match &self.notifications {
                Some(store) => step("notification purge", store.purge_expired(now).map_err(Into::into)),
                None => 0,
            },
        };
        info!(
            promoted = report.promoted,
            demoted = report.demoted,
            featured_expired = report.featured_expired,
            expired = report.expired,
            notifications_purged = report.notifications_purged,
            "daily sweep finished"
        );
        report
    }

    /// Handle `trending.check` tasks. Dependency failures are retried by the
    /// executor; domain rejections are final.
    pub fn register<S: TaskStore>(self: Arc<Self>, executor: &mut TaskExecutor<S>) {
        executor.register("trending.check", move |task| match &task.kind {
            TaskKind::TrendingCheck { job_id } => match self.check_job(*job_id, Utc::now()) {
                Ok(_) => TaskResult::Success,
                Err(ServiceError::Domain(e)) => {
                    warn!(job_id = %job_id, error = %e, "trending check skipped");
                    TaskResult::Success
                }
                Err(e) => TaskResult::Failure(e.to_string()),
            },
        });
    }

    /// Guarded promotion: only published jobs that are not already hot. The
    /// state machine repeats the check under the store lock.
    fn promote(&self, job_id: JobId, now: DateTime<Utc>) -> ServiceResult<bool> {
        let Some(job) = self.jobs.get(job_id)? else {
            return Ok(false);
        };
        if !job.is_published() || job.is_hot() {
            return Ok(false);
        }

        let executed = self.jobs.execute(
            job_id,
            ExpectedVersion::Any,
            &JobCommand::PromoteHot(PromoteHot {
                job_id,
                hot_until: self.policy.hot_until(now),
                occurred_at: now,
            }),
        )?;
        if executed.events.is_empty() {
            return Ok(false);
        }
        self.publisher
            .publish_all(&integration_events(&executed.job, &executed.events))?;
        info!(job_id = %job_id, slug = executed.job.slug(), "job promoted to hot");
        Ok(true)
    }

    /// Run one command per job, publishing whatever it produced. Failures are
    /// logged per job so one bad record does not stop the sweep.
    fn apply_each<I, F>(&self, jobs: I, command: F) -> usize
    where
        I: Iterator<Item = Job>,
        F: Fn(&Job) -> JobCommand,
    {
        let mut changed = 0;
        for job in jobs {
            let result = self
                .jobs
                .execute(job.id_typed(), ExpectedVersion::Any, &command(&job))
                .map_err(ServiceError::from)
                .and_then(|executed| {
                    self.publisher
                        .publish_all(&integration_events(&executed.job, &executed.events))?;
                    Ok(!executed.events.is_empty())
                });
            match result {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => warn!(job_id = %job.id_typed(), slug = job.slug(), error = %e, "sweep step failed for job"),
            }
        }
        changed
    }
}

fn step(name: &'static str, result: ServiceResult<usize>) -> usize {
    result.unwrap_or_else(|e| {
        error!(step = name, error = %e, "sweep step failed");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{Harness, recruiter};
    use crate::tasks::{InMemoryTaskStore, Task};
    use chrono::Duration;
    use jobmesh_core::UserId;
    use jobmesh_events::IntegrationEvent;
    use jobmesh_jobs::Application;

    fn service(h: &Harness) -> TrendingService {
        TrendingService::new(
            h.job_store.clone(),
            h.application_store.clone(),
            h.bus.clone(),
            TrendingPolicy::default(),
        )
    }

    fn add_applications(h: &Harness, job: &Job, count: usize, at: DateTime<Utc>) {
        for _ in 0..count {
            let application =
                Application::submit(job.id_typed(), UserId::new(), "https://cv.example.com/a.pdf", None, at)
                    .unwrap();
            h.application_store.insert(application).unwrap();
        }
    }

    #[test]
    fn sweep_promotes_once() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        let now = Utc::now();
        add_applications(&h, &job, 10, now - Duration::hours(2));
        h.clear_published();
        let trending = service(&h);

        assert_eq!(trending.promote_trending(now).unwrap(), 1);
        let hot = h.job_store.get(job.id_typed()).unwrap().unwrap();
        assert!(hot.is_hot());
        assert_eq!(hot.hot_until(), Some(now + Duration::days(7)));
        let events = h.published();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], IntegrationEvent::JobHot(e) if e.is_hot));

        assert_eq!(trending.promote_trending(now).unwrap(), 0);
        assert_eq!(h.published().len(), 1);
    }

    #[test]
    fn applications_outside_the_window_do_not_count() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        let now = Utc::now();
        add_applications(&h, &job, 9, now - Duration::hours(1));
        add_applications(&h, &job, 5, now - Duration::days(3));

        assert_eq!(service(&h).promote_trending(now).unwrap(), 0);
        assert!(!service(&h).check_job(job.id_typed(), now).unwrap());
    }

    #[test]
    fn ad_hoc_check_and_sweep_agree() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        let now = Utc::now();
        add_applications(&h, &job, 10, now);
        h.clear_published();
        let trending = service(&h);

        assert!(trending.check_job(job.id_typed(), now).unwrap());
        assert_eq!(trending.promote_trending(now).unwrap(), 0);
        assert_eq!(h.published().len(), 1);
    }

    #[test]
    fn demotion_only_touches_expired_hot_jobs() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        let now = Utc::now();
        add_applications(&h, &job, 10, now);
        let trending = service(&h);
        trending.promote_trending(now).unwrap();
        h.clear_published();

        assert_eq!(trending.demote_expired(now + Duration::days(1)).unwrap(), 0);
        assert_eq!(trending.demote_expired(now + Duration::days(8)).unwrap(), 1);
        assert!(matches!(&h.published()[0], IntegrationEvent::JobHot(e) if !e.is_hot));

        assert_eq!(trending.demote_expired(now + Duration::days(9)).unwrap(), 0);
        assert_eq!(h.published().len(), 1);
    }

    #[test]
    fn daily_run_expires_featured_and_past_deadline() {
        let h = Harness::new();
        let company = h.company(5, 1);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        h.jobs.mark_featured(job.id_typed(), &poster, Utc::now()).unwrap();
        h.clear_published();

        let report = service(&h).run_daily(Utc::now() + Duration::days(45));
        assert_eq!(report.featured_expired, 1);
        assert_eq!(report.expired, 1);

        let after = h.job_store.get(job.id_typed()).unwrap().unwrap();
        assert!(!after.is_featured());
        assert_eq!(after.status(), JobStatus::Expired);
        let keys: Vec<_> = h.published().iter().map(|e| e.routing_key()).collect();
        assert_eq!(keys, vec!["job.featured", "job.status.changed"]);
    }

    #[test]
    fn trending_check_task_runs_through_the_executor() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        add_applications(&h, &job, 10, Utc::now());

        let trending = Arc::new(service(&h));
        let store = Arc::new(InMemoryTaskStore::new());
        let mut executor = TaskExecutor::new(store.clone());
        Arc::clone(&trending).register(&mut executor);

        store
            .enqueue(Task::new(TaskKind::trending_check(job.id_typed()), Utc::now()))
            .unwrap();
        assert_eq!(executor.run_pending(Utc::now()).unwrap(), 1);
        assert_eq!(store.stats().unwrap().completed, 1);
        assert!(h.job_store.get(job.id_typed()).unwrap().unwrap().is_hot());
    }
}
