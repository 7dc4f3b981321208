//! Job admission and lifecycle.
//!
//! Every write goes through the job store's conditional operations, so quota
//! and slug checks are re-evaluated under the store lock. Integration events
//! are published only after the write has been persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use jobmesh_auth::{Actor, Role, ensure_poster_or_company_admin, ensure_role};
use jobmesh_core::{CompanyId, DomainError, ExpectedVersion, JobId};
use jobmesh_jobs::outbound::{deleted_event, integration_events};
use jobmesh_jobs::similarity::rank_similar;
use jobmesh_jobs::slug::{slugify, unique_slug};
use jobmesh_jobs::subscription::{featured_expiry, require_snapshot};
use jobmesh_jobs::{
    AdmissionQuota, CreateJob, FeatureJob, Job, JobCommand, JobDraft, JobStatus, JobTransition,
    ModerateJob, SubscriptionSnapshot,
};

use crate::cache::SubscriptionCache;
use crate::error::{ServiceResult, StoreError};
use crate::pagination::{PageRequest, Pagination, paginate};
use crate::publisher::Publisher;
use crate::store::{ApplicationRepository, Executed, JobFilter, JobRepository, SavedJobRepository};

/// Insert attempts before a slug race is reported as a conflict.
const SLUG_ATTEMPTS: usize = 5;

pub struct JobService {
    jobs: Arc<dyn JobRepository>,
    applications: Arc<dyn ApplicationRepository>,
    saved: Arc<dyn SavedJobRepository>,
    cache: Arc<dyn SubscriptionCache>,
    publisher: Arc<dyn Publisher>,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        applications: Arc<dyn ApplicationRepository>,
        saved: Arc<dyn SavedJobRepository>,
        cache: Arc<dyn SubscriptionCache>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            jobs,
            applications,
            saved,
            cache,
            publisher,
        }
    }

    /// Admit a new job in `Pending`. Nothing is published until moderation.
    #[instrument(skip(self, draft, actor), fields(user_id = %actor.user_id()), err)]
    pub fn create_job(&self, draft: JobDraft, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Job> {
        ensure_role(actor, &[Role::Recruiter], "post jobs")?;
        let (details, wants_featured) = draft.validate(now)?;
        if let Some(company) = actor.company_id() {
            if company != details.company {
                return Err(DomainError::permission_denied(
                    "cannot post jobs for another company",
                )
                .into());
            }
        }

        let snapshot = self.snapshot(details.company)?;
        let quota = AdmissionQuota::for_creation(&snapshot, wants_featured);
        if wants_featured {
            featured_expiry(&snapshot, now)?;
        }

        let base = slugify(&details.title);
        for attempt in 1..=SLUG_ATTEMPTS {
            let slug = unique_slug(&base, |candidate| self.jobs.slug_taken(candidate))?;
            let id = JobId::new();
            let mut job = Job::empty(id);
            jobmesh_core::execute(
                &mut job,
                &JobCommand::Create(CreateJob {
                    job_id: id,
                    slug,
                    details: details.clone(),
                    posted_by: actor.user_id(),
                    featured_requested: wants_featured,
                    occurred_at: now,
                }),
            )?;

            match self.jobs.insert(job.clone(), &quota) {
                Ok(()) => {
                    info!(job_id = %id, slug = job.slug(), company_id = %job.company(), "job created");
                    return Ok(job);
                }
                Err(StoreError::SlugTaken(slug)) => {
                    warn!(slug, attempt, "slug taken concurrently, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DomainError::conflict("could not allocate a unique slug").into())
    }

    /// Publish a pending job. A featured request made at creation is granted
    /// now if the current plan still allows it.
    #[instrument(skip(self, actor), err)]
    pub fn approve(&self, job_id: JobId, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Job> {
        ensure_role(actor, &[Role::Admin], "approve jobs")?;
        let executed = self.jobs.execute(
            job_id,
            ExpectedVersion::Any,
            &JobCommand::Approve(ModerateJob {
                job_id,
                reason: None,
                occurred_at: now,
            }),
        )?;
        self.publish(&executed)?;
        info!(job_id = %job_id, slug = executed.job.slug(), "job approved");

        let job = executed.job;
        if job.featured_requested() && !job.is_featured() {
            match self.grant_featured(&job, now) {
                Ok(featured) => return Ok(featured),
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "featured request not granted on approval");
                }
            }
        }
        Ok(job)
    }

    #[instrument(skip(self, actor, reason), err)]
    pub fn reject(
        &self,
        job_id: JobId,
        reason: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<Job> {
        ensure_role(actor, &[Role::Admin], "reject jobs")?;
        let executed = self.jobs.execute(
            job_id,
            ExpectedVersion::Any,
            &JobCommand::Reject(ModerateJob {
                job_id,
                reason,
                occurred_at: now,
            }),
        )?;
        info!(job_id = %job_id, "job rejected");
        Ok(executed.job)
    }

    /// Feature a published job against the company's current plan.
    #[instrument(skip(self, actor), err)]
    pub fn mark_featured(&self, job_id: JobId, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Job> {
        let job = self.load(job_id)?;
        ensure_poster_or_company_admin(actor, job.posted_by(), job.company(), "feature this job")?;
        self.grant_featured(&job, now)
    }

    #[instrument(skip(self, actor), err)]
    pub fn close(&self, job_id: JobId, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Job> {
        let job = self.load(job_id)?;
        ensure_poster_or_company_admin(actor, job.posted_by(), job.company(), "close this job")?;
        self.transition(JobCommand::Close(JobTransition::new(job_id, now)))
    }

    #[instrument(skip(self, actor), err)]
    pub fn archive(&self, job_id: JobId, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Job> {
        let job = self.load(job_id)?;
        ensure_poster_or_company_admin(actor, job.posted_by(), job.company(), "archive this job")?;
        self.transition(JobCommand::Archive(JobTransition::new(job_id, now)))
    }

    /// Remove a job together with its applications and saves.
    #[instrument(skip(self, actor), err)]
    pub fn delete(&self, slug: &str, actor: &Actor) -> ServiceResult<Job> {
        let job = self.get_job(slug)?;
        if actor.role() != Role::Admin {
            ensure_poster_or_company_admin(actor, job.posted_by(), job.company(), "delete this job")?;
        }

        let removed = self
            .jobs
            .delete(job.id_typed())?
            .ok_or_else(|| DomainError::not_found("job"))?;
        let applications = self.applications.delete_for_job(removed.id_typed())?;
        let saves = self.saved.delete_for_job(removed.id_typed())?;
        info!(
            job_id = %removed.id_typed(),
            slug = removed.slug(),
            applications,
            saves,
            "job deleted"
        );

        self.publisher.publish_event(&deleted_event(&removed))?;
        Ok(removed)
    }

    pub fn get_job(&self, slug: &str) -> ServiceResult<Job> {
        Ok(self
            .jobs
            .get_by_slug(slug)?
            .ok_or_else(|| DomainError::not_found("job"))?)
    }

    pub fn get_job_by_id(&self, job_id: JobId) -> ServiceResult<Job> {
        self.load(job_id)
    }

    pub fn list_company_jobs(
        &self,
        company: CompanyId,
        page: PageRequest,
    ) -> ServiceResult<(Vec<Job>, Pagination)> {
        let jobs = self.jobs.find(&JobFilter::new().company(company))?;
        Ok(paginate(jobs, page))
    }

    pub fn my_posted_jobs(&self, actor: &Actor, page: PageRequest) -> ServiceResult<(Vec<Job>, Pagination)> {
        ensure_role(actor, &[Role::Recruiter], "list posted jobs")?;
        let jobs = self.jobs.find(&JobFilter::new().posted_by(actor.user_id()))?;
        Ok(paginate(jobs, page))
    }

    /// Published jobs in `category`; a platform admin sees every status.
    pub fn list_by_category(&self, category: &str, actor: Option<&Actor>) -> ServiceResult<Vec<Job>> {
        let mut filter = JobFilter::new().category(category);
        if actor.is_none_or(|a| a.role() != Role::Admin) {
            filter = filter.status(JobStatus::Published);
        }
        Ok(self.jobs.find(&filter)?)
    }

    pub fn similar_jobs(&self, slug: &str, limit: usize, now: DateTime<Utc>) -> ServiceResult<Vec<Job>> {
        let reference = self.get_job(slug)?;
        let candidates = self.jobs.find(&JobFilter::new().status(JobStatus::Published))?;
        Ok(rank_similar(&reference, &candidates, now, limit)
            .into_iter()
            .map(|(job, _)| job.clone())
            .collect())
    }

    fn load(&self, job_id: JobId) -> ServiceResult<Job> {
        Ok(self
            .jobs
            .get(job_id)?
            .ok_or_else(|| DomainError::not_found("job"))?)
    }

    fn snapshot(&self, company: CompanyId) -> ServiceResult<SubscriptionSnapshot> {
        Ok(require_snapshot(self.cache.get(company)?, company)?)
    }

    fn grant_featured(&self, job: &Job, now: DateTime<Utc>) -> ServiceResult<Job> {
        let snapshot = self.snapshot(job.company())?;
        let expires_at = featured_expiry(&snapshot, now)?;
        let executed = self.jobs.feature_within_limit(
            job.id_typed(),
            snapshot.featured_jobs_limit,
            &JobCommand::Feature(FeatureJob {
                job_id: job.id_typed(),
                expires_at,
                occurred_at: now,
            }),
        )?;
        self.publish(&executed)?;
        info!(job_id = %job.id_typed(), expires_at = ?expires_at, "job featured");
        Ok(executed.job)
    }

    fn transition(&self, command: JobCommand) -> ServiceResult<Job> {
        let job_id = command.job_id();
        let executed = self.jobs.execute(job_id, ExpectedVersion::Any, &command)?;
        self.publish(&executed)?;
        info!(job_id = %job_id, status = executed.job.status().as_str(), "job status changed");
        Ok(executed.job)
    }

    fn publish(&self, executed: &Executed) -> ServiceResult<()> {
        self.publisher
            .publish_all(&integration_events(&executed.job, &executed.events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{Harness, admin, applicant, draft, recruiter};
    use jobmesh_events::IntegrationEvent;

    #[test]
    fn cache_miss_fails_closed() {
        let h = Harness::new();
        let company = CompanyId::new();
        let poster = recruiter(company);

        let err = h.jobs.create_job(draft(company, "Rust Engineer"), &poster, Utc::now()).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::QuotaUnavailable(_))));
        assert!(h.job_store.find(&JobFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn only_recruiters_post() {
        let h = Harness::new();
        let company = h.company(3, 1);
        let err = h.jobs.create_job(draft(company, "Rust Engineer"), &admin(), Utc::now()).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::PermissionDenied(_))));
    }

    #[test]
    fn job_limit_is_enforced() {
        let h = Harness::new();
        let company = h.company(2, 0);
        let poster = recruiter(company);
        let now = Utc::now();

        h.jobs.create_job(draft(company, "Backend Engineer"), &poster, now).unwrap();
        h.jobs.create_job(draft(company, "Frontend Engineer"), &poster, now).unwrap();
        let err = h.jobs.create_job(draft(company, "Data Engineer"), &poster, now).unwrap_err();

        assert!(matches!(err.domain(), Some(DomainError::QuotaExceeded(_))));
        assert_eq!(h.job_store.find(&JobFilter::new().company(company)).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_posts_never_exceed_the_job_limit() {
        let h = Harness::new();
        let company = h.company(3, 0);
        let poster = recruiter(company);
        let now = Utc::now();

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let (h, poster) = (&h, &poster);
                    scope.spawn(move || h.jobs.create_job(draft(company, &format!("Backend Engineer {i}")), poster, now))
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        let created = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 3);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err.domain(), Some(DomainError::QuotaExceeded(_))));
        }
        assert_eq!(h.job_store.find(&JobFilter::new().company(company)).unwrap().len(), 3);
    }

    #[test]
    fn colliding_titles_get_suffixed_slugs() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let now = Utc::now();

        let first = h.jobs.create_job(draft(company, "Senior Engineer"), &poster, now).unwrap();
        let second = h.jobs.create_job(draft(company, "Senior Engineer"), &poster, now).unwrap();
        assert_eq!(first.slug(), "senior-engineer");
        assert_eq!(second.slug(), "senior-engineer-1");
        assert_eq!(first.status(), JobStatus::Pending);
    }

    #[test]
    fn creation_publishes_nothing_and_approval_publishes_snapshot() {
        let h = Harness::new();
        let company = h.company(3, 1);
        let now = Utc::now();
        let job = h.jobs.create_job(draft(company, "Site Reliability Engineer"), &recruiter(company), now).unwrap();
        assert!(h.published().is_empty());

        let approved = h.jobs.approve(job.id_typed(), &admin(), now).unwrap();
        assert!(approved.is_published());
        let events = h.published();
        assert_eq!(events.len(), 1);
        match &events[0] {
            IntegrationEvent::JobPublished(snapshot) => assert_eq!(snapshot.slug, job.slug()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn featured_request_is_granted_after_publication() {
        let h = Harness::new();
        let company = h.company(3, 1);
        let now = Utc::now();
        let mut payload = draft(company, "Staff Engineer");
        payload.is_featured = true;
        let job = h.jobs.create_job(payload, &recruiter(company), now).unwrap();

        let approved = h.jobs.approve(job.id_typed(), &admin(), now).unwrap();
        assert!(approved.is_featured());
        let keys: Vec<_> = h.published().iter().map(|e| e.routing_key()).collect();
        assert_eq!(keys, vec!["job.published", "job.featured"]);
    }

    #[test]
    fn approval_survives_a_downgraded_plan() {
        let h = Harness::new();
        let company = h.company(3, 1);
        let now = Utc::now();
        let mut payload = draft(company, "Staff Engineer");
        payload.is_featured = true;
        let job = h.jobs.create_job(payload, &recruiter(company), now).unwrap();
        h.set_plan(company, 3, 0);

        let approved = h.jobs.approve(job.id_typed(), &admin(), now).unwrap();
        assert!(approved.is_published());
        assert!(!approved.is_featured());
        let keys: Vec<_> = h.published().iter().map(|e| e.routing_key()).collect();
        assert_eq!(keys, vec!["job.published"]);
    }

    #[test]
    fn mark_featured_rechecks_current_plan() {
        let h = Harness::new();
        let company = h.company(5, 1);
        let poster = recruiter(company);
        let now = Utc::now();
        let a = h.published_job(company, &poster, "Platform Engineer");
        let b = h.published_job(company, &poster, "Security Engineer");

        h.jobs.mark_featured(a.id_typed(), &poster, now).unwrap();
        let err = h.jobs.mark_featured(b.id_typed(), &poster, now).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::QuotaExceeded(_))));

        h.set_plan(company, 5, 2);
        assert!(h.jobs.mark_featured(b.id_typed(), &poster, now).unwrap().is_featured());
    }

    #[test]
    fn only_poster_or_company_admin_may_feature() {
        let h = Harness::new();
        let company = h.company(5, 2);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");

        let stranger = recruiter(company);
        let err = h.jobs.mark_featured(job.id_typed(), &stranger, Utc::now()).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::PermissionDenied(_))));
    }

    #[test]
    fn close_emits_status_change() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        h.clear_published();

        let closed = h.jobs.close(job.id_typed(), &poster, Utc::now()).unwrap();
        assert_eq!(closed.status(), JobStatus::Closed);
        assert_eq!(h.published()[0].routing_key(), "job.status.changed");
    }

    #[test]
    fn delete_removes_job_and_frees_slug() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        h.clear_published();

        h.jobs.delete(job.slug(), &admin()).unwrap();
        assert!(h.job_store.get(job.id_typed()).unwrap().is_none());
        assert!(!h.job_store.slug_taken(job.slug()).unwrap());
        assert_eq!(h.published()[0].routing_key(), "job.deleted");

        let err = h.jobs.get_job(job.slug()).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
    }

    #[test]
    fn delete_drops_saved_links() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        let user = applicant();
        h.saved_jobs.toggle(job.id_typed(), &user, Utc::now()).unwrap();
        assert!(h.saved_store.is_saved(user.user_id(), job.id_typed()).unwrap());

        h.jobs.delete(job.slug(), &admin()).unwrap();
        assert!(!h.saved_store.is_saved(user.user_id(), job.id_typed()).unwrap());
        assert!(h.saved_store.list_for_user(user.user_id()).unwrap().is_empty());
    }

    #[test]
    fn category_listing_hides_unpublished_from_non_admins() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        h.published_job(company, &poster, "Platform Engineer");
        h.jobs.create_job(draft(company, "Pending Engineer"), &poster, Utc::now()).unwrap();

        assert_eq!(h.jobs.list_by_category("ENGINEERING", None).unwrap().len(), 1);
        assert_eq!(h.jobs.list_by_category("engineering", Some(&admin())).unwrap().len(), 2);
    }

    #[test]
    fn my_posted_jobs_is_scoped_to_the_poster() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        h.published_job(company, &poster, "Platform Engineer");
        h.published_job(company, &recruiter(company), "Security Engineer");

        let (jobs, page) = h.jobs.my_posted_jobs(&poster, PageRequest::default()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(page.total, 1);

        let (all, _) = h.jobs.list_company_jobs(company, PageRequest::default()).unwrap();
        assert_eq!(all.len(), 2);
    }
}
