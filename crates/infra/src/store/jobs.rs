use std::collections::HashMap;
use std::sync::RwLock;

use jobmesh_core::{AggregateRoot, CompanyId, DomainError, ExpectedVersion, JobId, UserId, execute};
use jobmesh_jobs::{AdmissionQuota, Job, JobCommand, JobEvent, JobStatus};

use crate::error::StoreError;

/// State after a command plus the events it produced (empty for a no-op).
#[derive(Debug, Clone)]
pub struct Executed {
    pub job: Job,
    pub events: Vec<JobEvent>,
}

/// Secondary-index style lookup over jobs. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub company: Option<CompanyId>,
    pub posted_by: Option<UserId>,
    pub status: Option<JobStatus>,
    pub category: Option<String>,
    pub is_hot: Option<bool>,
    pub is_featured: Option<bool>,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company(mut self, company: CompanyId) -> Self {
        self.company = Some(company);
        self
    }

    pub fn posted_by(mut self, user: UserId) -> Self {
        self.posted_by = Some(user);
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn hot(mut self, is_hot: bool) -> Self {
        self.is_hot = Some(is_hot);
        self
    }

    pub fn featured(mut self, is_featured: bool) -> Self {
        self.is_featured = Some(is_featured);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.company.is_none_or(|c| job.company() == c)
            && self.posted_by.is_none_or(|u| job.posted_by() == u)
            && self.status.is_none_or(|s| job.status() == s)
            && self.is_hot.is_none_or(|h| job.is_hot() == h)
            && self.is_featured.is_none_or(|f| job.is_featured() == f)
            && self.category.as_deref().is_none_or(|wanted| {
                job.details()
                    .category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(wanted.trim()))
            })
    }
}

/// Job persistence.
///
/// Writes go through [`JobRepository::execute`] so the state machine, not the
/// caller, decides what changes.
pub trait JobRepository: Send + Sync {
    /// Insert a freshly created job.
    ///
    /// Under one write lock: the slug must be free and the company's job and
    /// featured counts must pass `quota`.
    fn insert(&self, job: Job, quota: &AdmissionQuota) -> Result<(), StoreError>;

    fn get(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    fn get_by_slug(&self, slug: &str) -> Result<Option<Job>, StoreError>;

    fn slug_taken(&self, slug: &str) -> Result<bool, StoreError>;

    /// Load, check `expected`, run `command` and persist the result.
    fn execute(
        &self,
        id: JobId,
        expected: ExpectedVersion,
        command: &JobCommand,
    ) -> Result<Executed, StoreError>;

    /// Like `execute`, but first requires the company to hold fewer than `limit`
    /// featured jobs (this one excluded), checked under the same lock.
    fn feature_within_limit(
        &self,
        id: JobId,
        limit: u32,
        command: &JobCommand,
    ) -> Result<Executed, StoreError>;

    /// Remove the job; returns its last state.
    fn delete(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Matching jobs, newest first.
    fn find(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError>;
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<JobId, Job>,
    slugs: HashMap<String, JobId>,
}

impl JobTable {
    /// Featured slots held by a company. A pending job that asked for one holds
    /// it too, so concurrent requests cannot oversubscribe the plan.
    fn featured_count(&self, company: CompanyId, except: Option<JobId>) -> u64 {
        self.jobs
            .values()
            .filter(|j| j.company() == company && Some(j.id_typed()) != except)
            .filter(|j| {
                j.is_featured() || (j.featured_requested() && j.status() == JobStatus::Pending)
            })
            .count() as u64
    }

    fn job_count(&self, company: CompanyId) -> u64 {
        self.jobs.values().filter(|j| j.company() == company).count() as u64
    }

    fn run(
        &mut self,
        id: JobId,
        expected: ExpectedVersion,
        command: &JobCommand,
    ) -> Result<Executed, StoreError> {
        let current = self
            .jobs
            .get(&id)
            .ok_or_else(|| DomainError::not_found("job"))?;
        expected.check(current.version())?;

        let mut job = current.clone();
        let events = execute(&mut job, command)?;
        if !events.is_empty() {
            self.jobs.insert(id, job.clone());
        }
        Ok(Executed { job, events })
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    inner: RwLock<JobTable>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRepository for InMemoryJobStore {
    fn insert(&self, job: Job, quota: &AdmissionQuota) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        if table.jobs.contains_key(&job.id_typed()) {
            return Err(DomainError::conflict("job already exists").into());
        }
        if table.slugs.contains_key(job.slug()) {
            return Err(StoreError::SlugTaken(job.slug().to_string()));
        }
        quota.check(
            table.job_count(job.company()),
            table.featured_count(job.company(), None),
        )?;

        table.slugs.insert(job.slug().to_string(), job.id_typed());
        table.jobs.insert(job.id_typed(), job);
        Ok(())
    }

    fn get(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.jobs.get(&id).cloned())
    }

    fn get_by_slug(&self, slug: &str) -> Result<Option<Job>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.slugs.get(slug).and_then(|id| table.jobs.get(id)).cloned())
    }

    fn slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.slugs.contains_key(slug))
    }

    fn execute(
        &self,
        id: JobId,
        expected: ExpectedVersion,
        command: &JobCommand,
    ) -> Result<Executed, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        table.run(id, expected, command)
    }

    fn feature_within_limit(
        &self,
        id: JobId,
        limit: u32,
        command: &JobCommand,
    ) -> Result<Executed, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let company = table
            .jobs
            .get(&id)
            .map(|j| j.company())
            .ok_or_else(|| DomainError::not_found("job"))?;

        jobmesh_jobs::subscription::check_featured_quota(limit, table.featured_count(company, Some(id)))?;
        table.run(id, ExpectedVersion::Any, command)
    }

    fn delete(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let removed = table.jobs.remove(&id);
        if let Some(job) = &removed {
            table.slugs.remove(job.slug());
        }
        Ok(removed)
    }

    fn find(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut jobs: Vec<Job> = table
            .jobs
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.slug().cmp(b.slug()))
        });
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use jobmesh_jobs::{CreateJob, FeatureJob, JobDetails, JobTransition, JobType, ModerateJob};

    fn pending_job(company: CompanyId, slug: &str, featured: bool, now: DateTime<Utc>) -> Job {
        let id = JobId::new();
        let mut job = Job::empty(id);
        execute(
            &mut job,
            &JobCommand::Create(CreateJob {
                job_id: id,
                slug: slug.to_string(),
                details: JobDetails {
                    title: "Platform Engineer".into(),
                    description: "Keep the event bus healthy".into(),
                    company,
                    company_name: "Acme".into(),
                    location: "Remote".into(),
                    salary: 90_000,
                    experience: None,
                    skills: vec!["rust".into()],
                    job_type: JobType::FullTime,
                    benefits: vec![],
                    category: Some("engineering".into()),
                    application_deadline: now + Duration::days(30),
                },
                posted_by: UserId::new(),
                featured_requested: featured,
                occurred_at: now,
            }),
        )
        .unwrap();
        job
    }

    fn quota(jobs: u32, featured: Option<u32>) -> AdmissionQuota {
        AdmissionQuota {
            job_post_limit: jobs,
            featured_jobs_limit: featured,
        }
    }

    #[test]
    fn insert_enforces_job_limit_under_lock() {
        let store = InMemoryJobStore::new();
        let company = CompanyId::new();
        let now = Utc::now();

        store.insert(pending_job(company, "a", false, now), &quota(2, None)).unwrap();
        store.insert(pending_job(company, "b", false, now), &quota(2, None)).unwrap();
        let err = store
            .insert(pending_job(company, "c", false, now), &quota(2, None))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::QuotaExceeded(_))));

        // Other companies are unaffected.
        store
            .insert(pending_job(CompanyId::new(), "c", false, now), &quota(2, None))
            .unwrap();
    }

    #[test]
    fn insert_rejects_taken_slug() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        store
            .insert(pending_job(CompanyId::new(), "rust-dev", false, now), &quota(5, None))
            .unwrap();
        let err = store
            .insert(pending_job(CompanyId::new(), "rust-dev", false, now), &quota(5, None))
            .unwrap_err();
        assert!(matches!(err, StoreError::SlugTaken(s) if s == "rust-dev"));
        assert!(store.slug_taken("rust-dev").unwrap());
    }

    #[test]
    fn pending_featured_requests_count_against_featured_limit() {
        let store = InMemoryJobStore::new();
        let company = CompanyId::new();
        let now = Utc::now();

        store.insert(pending_job(company, "a", true, now), &quota(10, Some(1))).unwrap();
        let err = store
            .insert(pending_job(company, "b", true, now), &quota(10, Some(1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::QuotaExceeded(_))));
    }

    #[test]
    fn execute_checks_expected_version_and_persists() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let job = pending_job(CompanyId::new(), "ops", false, now);
        let id = job.id_typed();
        store.insert(job, &quota(5, None)).unwrap();

        let approve = JobCommand::Approve(ModerateJob {
            job_id: id,
            reason: None,
            occurred_at: now,
        });
        let err = store.execute(id, ExpectedVersion::Exact(7), &approve).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));

        let executed = store.execute(id, ExpectedVersion::Exact(1), &approve).unwrap();
        assert_eq!(executed.events.len(), 1);
        assert_eq!(store.get(id).unwrap().unwrap().status(), JobStatus::Published);
    }

    #[test]
    fn feature_within_limit_counts_other_featured_jobs() {
        let store = InMemoryJobStore::new();
        let company = CompanyId::new();
        let now = Utc::now();

        let mut ids = Vec::new();
        for slug in ["a", "b"] {
            let job = pending_job(company, slug, false, now);
            ids.push(job.id_typed());
            store.insert(job, &quota(5, None)).unwrap();
            store
                .execute(
                    *ids.last().unwrap(),
                    ExpectedVersion::Any,
                    &JobCommand::Approve(ModerateJob {
                        job_id: *ids.last().unwrap(),
                        reason: None,
                        occurred_at: now,
                    }),
                )
                .unwrap();
        }

        let feature = |id| {
            JobCommand::Feature(FeatureJob {
                job_id: id,
                expires_at: None,
                occurred_at: now,
            })
        };
        store.feature_within_limit(ids[0], 1, &feature(ids[0])).unwrap();
        let err = store.feature_within_limit(ids[1], 1, &feature(ids[1])).unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::QuotaExceeded(_))));
    }

    #[test]
    fn no_op_commands_do_not_bump_version() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let job = pending_job(CompanyId::new(), "ops", false, now);
        let id = job.id_typed();
        store.insert(job, &quota(5, None)).unwrap();

        let executed = store
            .execute(id, ExpectedVersion::Any, &JobCommand::ExpireHot(JobTransition::new(id, now)))
            .unwrap();
        assert!(executed.events.is_empty());
        assert_eq!(store.get(id).unwrap().unwrap().version(), 1);
    }

    #[test]
    fn find_filters_and_delete_frees_slug() {
        let store = InMemoryJobStore::new();
        let company = CompanyId::new();
        let now = Utc::now();
        let job = pending_job(company, "keep", false, now);
        let id = job.id_typed();
        store.insert(job, &quota(5, None)).unwrap();
        store
            .insert(pending_job(CompanyId::new(), "other", false, now), &quota(5, None))
            .unwrap();

        let found = store.find(&JobFilter::new().company(company)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            store.find(&JobFilter::new().category("Engineering")).unwrap().len(),
            2
        );

        assert!(store.delete(id).unwrap().is_some());
        assert!(!store.slug_taken("keep").unwrap());
        assert!(store.get_by_slug("keep").unwrap().is_none());
    }
}
