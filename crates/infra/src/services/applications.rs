//! Applying to jobs and moving applications through review.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use jobmesh_auth::{Actor, CompanyPermission, Role, ensure_company_permission, ensure_role};
use jobmesh_core::{ApplicationId, DomainError, JobId};
use jobmesh_events::IntegrationEvent;
use jobmesh_events::integration::{
    ApplicationStatusMetadata, ApplicationStatusUpdated, JobApplicationReceived,
};
use jobmesh_jobs::{Application, ApplicationStatus, Job, status_notice};

use crate::error::ServiceResult;
use crate::publisher::Publisher;
use crate::store::{ApplicationRepository, JobRepository};
use crate::tasks::{Task, TaskKind, TaskStore};

/// Schedules the per-job trending check that follows a new application.
pub trait TrendingTrigger: Send + Sync {
    fn schedule_check(&self, job_id: JobId, now: DateTime<Utc>) -> ServiceResult<()>;
}

/// Enqueues a delayed `trending.check` task. A check already waiting for the
/// same job absorbs the request.
pub struct TaskQueueTrigger<S> {
    store: S,
    delay: Duration,
}

impl<S: TaskStore> TaskQueueTrigger<S> {
    pub fn new(store: S, delay: Duration) -> Self {
        Self { store, delay }
    }
}

impl<S: TaskStore> TrendingTrigger for TaskQueueTrigger<S> {
    fn schedule_check(&self, job_id: JobId, now: DateTime<Utc>) -> ServiceResult<()> {
        let task = Task::new(TaskKind::trending_check(job_id), now).delayed(self.delay);
        match self.store.enqueue_unique(task)? {
            Some(task_id) => info!(job_id = %job_id, task_id = %task_id, "trending check scheduled"),
            None => info!(job_id = %job_id, "trending check already pending"),
        }
        Ok(())
    }
}

/// Body of a status change request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub interview_date: Option<DateTime<Utc>>,
}

pub struct ApplicationService {
    jobs: Arc<dyn JobRepository>,
    applications: Arc<dyn ApplicationRepository>,
    publisher: Arc<dyn Publisher>,
    trending: Arc<dyn TrendingTrigger>,
}

impl ApplicationService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        applications: Arc<dyn ApplicationRepository>,
        publisher: Arc<dyn Publisher>,
        trending: Arc<dyn TrendingTrigger>,
    ) -> Self {
        Self {
            jobs,
            applications,
            publisher,
            trending,
        }
    }

    /// Apply to a published job. The poster is notified and a trending check
    /// is scheduled; a failure to schedule is left to the daily sweep.
    #[instrument(skip(self, resume_url, cover_letter, actor), fields(user_id = %actor.user_id()), err)]
    pub fn apply(
        &self,
        slug: &str,
        resume_url: &str,
        cover_letter: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<Application> {
        ensure_role(actor, &[Role::Applicant], "apply for jobs")?;
        let job = self
            .jobs
            .get_by_slug(slug)?
            .ok_or_else(|| DomainError::not_found("job"))?;
        if !job.accepts_applications(now) {
            return Err(DomainError::invariant("this job is not accepting applications").into());
        }

        let application = Application::submit(job.id_typed(), actor.user_id(), resume_url, cover_letter, now)?;
        self.applications.insert(application.clone())?;
        info!(
            job_id = %job.id_typed(),
            application_id = %application.id(),
            "application received"
        );

        self.publisher
            .publish_event(&IntegrationEvent::JobApplication(JobApplicationReceived {
                user_id: job.posted_by(),
                job_id: job.id_typed(),
                job_slug: job.slug().to_string(),
                application_id: application.id(),
                applicant_id: actor.user_id(),
                message: format!("New application received for \"{}\"", job.title()),
            }))?;

        if let Err(e) = self.trending.schedule_check(job.id_typed(), now) {
            warn!(job_id = %job.id_typed(), error = %e, "trending check not scheduled");
        }
        Ok(application)
    }

    /// Change an application's status. Only the recruiter who posted the job
    /// may do this; an actual change notifies the applicant.
    #[instrument(skip(self, update, actor), fields(status = update.status.as_str()), err)]
    pub fn update_status(
        &self,
        application_id: ApplicationId,
        update: StatusUpdate,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ServiceResult<Application> {
        ensure_role(actor, &[Role::Recruiter], "update application status")?;
        let mut application = self
            .applications
            .get(application_id)?
            .ok_or_else(|| DomainError::not_found("application"))?;
        let job = self.job(application.job_id())?;
        if job.posted_by() != actor.user_id() {
            return Err(DomainError::permission_denied(
                "only the recruiter who posted this job may update its applications",
            )
            .into());
        }

        let old = application.change_status(update.status, actor.user_id(), update.notes, now);
        self.applications.update(&application)?;

        let Some(old_status) = old else {
            return Ok(application);
        };
        info!(
            application_id = %application_id,
            from = old_status.as_str(),
            to = update.status.as_str(),
            "application status changed"
        );

        let notice = status_notice(update.status, job.title(), job.slug(), application_id);
        self.publisher
            .publish_event(&IntegrationEvent::ApplicationStatusUpdated(ApplicationStatusUpdated {
                user_id: application.user_id(),
                job_id: job.id_typed(),
                application_id,
                status: update.status,
                old_status,
                message: notice.message,
                priority: notice.priority,
                metadata: ApplicationStatusMetadata {
                    job_slug: job.slug().to_string(),
                    job_title: job.title().to_string(),
                    company_name: Some(job.details().company_name.clone()),
                    notes: application.notes().map(str::to_string),
                    interview_date: update.interview_date,
                },
                actions: notice.actions,
            }))?;
        Ok(application)
    }

    pub fn has_applied(&self, slug: &str, actor: &Actor) -> ServiceResult<bool> {
        let Some(job) = self.jobs.get_by_slug(slug)? else {
            return Ok(false);
        };
        Ok(self
            .applications
            .find_by_job_and_user(job.id_typed(), actor.user_id())?
            .is_some())
    }

    pub fn list_my_applications(&self, actor: &Actor) -> ServiceResult<Vec<Application>> {
        Ok(self.applications.list_for_user(actor.user_id())?)
    }

    /// Applicants of a job: its poster, or a company member allowed to view
    /// applications.
    pub fn list_job_applicants(&self, job_id: JobId, actor: &Actor) -> ServiceResult<Vec<Application>> {
        let job = self.job(job_id)?;
        if job.posted_by() != actor.user_id() {
            ensure_company_permission(actor, job.company(), CompanyPermission::ViewApplications)?;
        }
        Ok(self.applications.list_for_job(job_id)?)
    }

    fn job(&self, job_id: JobId) -> ServiceResult<Job> {
        Ok(self
            .jobs
            .get(job_id)?
            .ok_or_else(|| DomainError::not_found("job"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{Harness, applicant, recruiter};
    use crate::tasks::InMemoryTaskStore;
    use jobmesh_core::UserId;
    use jobmesh_events::integration::Priority;

    const RESUME: &str = "https://files.example.com/cv.pdf";

    #[test]
    fn apply_notifies_poster_and_schedules_check() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        h.clear_published();

        let candidate = applicant();
        let application = h
            .applications
            .apply(job.slug(), RESUME, None, &candidate, Utc::now())
            .unwrap();

        match &h.published()[0] {
            IntegrationEvent::JobApplication(e) => {
                assert_eq!(e.user_id, poster.user_id());
                assert_eq!(e.applicant_id, candidate.user_id());
                assert_eq!(e.application_id, application.id());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.tasks.stats().unwrap().pending, 1);
    }

    #[test]
    fn second_application_conflicts() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h.published_job(company, &recruiter(company), "Platform Engineer");
        let candidate = applicant();
        let now = Utc::now();

        h.applications.apply(job.slug(), RESUME, None, &candidate, now).unwrap();
        let err = h.applications.apply(job.slug(), RESUME, None, &candidate, now).unwrap_err();

        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));
        assert_eq!(h.application_store.list_for_job(job.id_typed()).unwrap().len(), 1);
        assert!(h.applications.has_applied(job.slug(), &candidate).unwrap());
    }

    #[test]
    fn pending_jobs_do_not_accept_applications() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let job = h
            .jobs
            .create_job(crate::services::testing::draft(company, "Platform Engineer"), &recruiter(company), Utc::now())
            .unwrap();

        let err = h
            .applications
            .apply(job.slug(), RESUME, None, &applicant(), Utc::now())
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn status_update_is_limited_to_the_poster() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        let application = h.applications.apply(job.slug(), RESUME, None, &applicant(), Utc::now()).unwrap();
        let update = StatusUpdate {
            status: ApplicationStatus::InReview,
            notes: None,
            interview_date: None,
        };

        let err = h
            .applications
            .update_status(application.id(), update, &recruiter(company), Utc::now())
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::PermissionDenied(_))));
    }

    #[test]
    fn status_change_is_recorded_and_announced_once() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        let candidate = applicant();
        let application = h.applications.apply(job.slug(), RESUME, None, &candidate, Utc::now()).unwrap();
        h.clear_published();

        let update = StatusUpdate {
            status: ApplicationStatus::Accepted,
            notes: Some("strong systems background".into()),
            interview_date: None,
        };
        let updated = h
            .applications
            .update_status(application.id(), update.clone(), &poster, Utc::now())
            .unwrap();
        assert_eq!(updated.status_history().len(), 1);

        match &h.published()[0] {
            IntegrationEvent::ApplicationStatusUpdated(e) => {
                assert_eq!(e.user_id, candidate.user_id());
                assert_eq!(e.old_status, ApplicationStatus::Pending);
                assert_eq!(e.priority, Priority::High);
                assert_eq!(e.metadata.job_slug, job.slug());
                assert_eq!(e.metadata.notes.as_deref(), Some("strong systems background"));
            }
            other => panic!("unexpected {other:?}"),
        }

        h.clear_published();
        h.applications
            .update_status(application.id(), update, &poster, Utc::now())
            .unwrap();
        assert!(h.published().is_empty());
    }

    #[test]
    fn applicants_visible_to_poster_and_permitted_members() {
        let h = Harness::new();
        let company = h.company(5, 0);
        let poster = recruiter(company);
        let job = h.published_job(company, &poster, "Platform Engineer");
        h.applications.apply(job.slug(), RESUME, None, &applicant(), Utc::now()).unwrap();

        assert_eq!(h.applications.list_job_applicants(job.id_typed(), &poster).unwrap().len(), 1);

        let member = Actor::new(UserId::new(), Role::Recruiter)
            .with_company(company)
            .with_permissions(vec![CompanyPermission::ViewApplications]);
        assert_eq!(h.applications.list_job_applicants(job.id_typed(), &member).unwrap().len(), 1);

        let err = h
            .applications
            .list_job_applicants(job.id_typed(), &applicant())
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::PermissionDenied(_))));
    }

    #[test]
    fn waiting_check_absorbs_repeat_triggers() {
        let store = Arc::new(InMemoryTaskStore::new());
        let trigger = TaskQueueTrigger::new(store.clone(), Duration::from_secs(1));
        let job = JobId::new();

        trigger.schedule_check(job, Utc::now()).unwrap();
        trigger.schedule_check(job, Utc::now()).unwrap();
        trigger.schedule_check(JobId::new(), Utc::now()).unwrap();

        assert_eq!(store.stats().unwrap().pending, 2);
    }
}
