use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobmesh_core::{Aggregate, AggregateRoot, CompanyId, DomainError, JobId, UserId};
use jobmesh_events::Event;
use jobmesh_events::integration::{JobSnapshot, JobStatus, JobType};

/// Descriptive fields of a posting, fixed at admission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub title: String,
    pub description: String,
    pub company: CompanyId,
    pub company_name: String,
    pub location: String,
    pub salary: u64,
    pub experience: Option<String>,
    pub skills: Vec<String>,
    pub job_type: JobType,
    pub benefits: Vec<String>,
    pub category: Option<String>,
    pub application_deadline: DateTime<Utc>,
}

/// Aggregate root: Job.
///
/// Lifecycle: `Pending -> Published | Rejected`, then `Published -> Closed | Expired | Archived`.
/// The featured and hot flags may only be raised while the job is published and are
/// cleared whenever it leaves that state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    id: JobId,
    slug: String,
    #[serde(flatten)]
    details: JobDetails,
    posted_by: UserId,
    status: JobStatus,
    is_featured: bool,
    featured_expiry: Option<DateTime<Utc>>,
    featured_requested: bool,
    is_hot: bool,
    hot_until: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Job {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: JobId) -> Self {
        Self {
            id,
            slug: String::new(),
            details: JobDetails {
                title: String::new(),
                description: String::new(),
                company: CompanyId::default(),
                company_name: String::new(),
                location: String::new(),
                salary: 0,
                experience: None,
                skills: Vec::new(),
                job_type: JobType::FullTime,
                benefits: Vec::new(),
                category: None,
                application_deadline: DateTime::<Utc>::MIN_UTC,
            },
            posted_by: UserId::default(),
            status: JobStatus::Draft,
            is_featured: false,
            featured_expiry: None,
            featured_requested: false,
            is_hot: false,
            hot_until: None,
            rejection_reason: None,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> JobId {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn details(&self) -> &JobDetails {
        &self.details
    }

    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn company(&self) -> CompanyId {
        self.details.company
    }

    pub fn posted_by(&self) -> UserId {
        self.posted_by
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_featured(&self) -> bool {
        self.is_featured
    }

    pub fn featured_expiry(&self) -> Option<DateTime<Utc>> {
        self.featured_expiry
    }

    /// Set at admission when the poster asked for a featured slot; consumed on approval.
    pub fn featured_requested(&self) -> bool {
        self.featured_requested
    }

    pub fn is_hot(&self) -> bool {
        self.is_hot
    }

    pub fn hot_until(&self) -> Option<DateTime<Utc>> {
        self.hot_until
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_published(&self) -> bool {
        self.status == JobStatus::Published
    }

    /// Published and still accepting applications at `now`.
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.is_published() && self.details.application_deadline > now
    }

    /// Full-record payload used by `job.created` / `job.published`.
    pub fn to_snapshot(&self, message: Option<String>) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            slug: self.slug.clone(),
            title: self.details.title.clone(),
            description: self.details.description.clone(),
            company: self.details.company,
            company_name: self.details.company_name.clone(),
            location: self.details.location.clone(),
            salary: self.details.salary,
            experience: self.details.experience.clone(),
            skills: self.details.skills.clone(),
            job_type: self.details.job_type,
            benefits: self.details.benefits.clone(),
            category: self.details.category.clone(),
            status: self.status,
            is_featured: self.is_featured,
            featured_expiry: self.featured_expiry,
            is_hot: self.is_hot,
            hot_until: self.hot_until,
            application_deadline: self.details.application_deadline,
            posted_by: self.posted_by,
            created_at: self.created_at,
            message,
        }
    }
}

impl AggregateRoot for Job {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateJob (admission; the job starts in `Pending`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJob {
    pub job_id: JobId,
    pub slug: String,
    pub details: JobDetails,
    pub posted_by: UserId,
    pub featured_requested: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve / Reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerateJob {
    pub job_id: JobId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Feature.
///
/// `expires_at` is the subscription end date; `None` means the slot never lapses on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureJob {
    pub job_id: JobId,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PromoteHot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoteHot {
    pub job_id: JobId,
    pub hot_until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Commands that carry nothing but the target and the business time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTransition {
    pub job_id: JobId,
    pub occurred_at: DateTime<Utc>,
}

impl JobTransition {
    pub fn new(job_id: JobId, occurred_at: DateTime<Utc>) -> Self {
        Self { job_id, occurred_at }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCommand {
    Create(CreateJob),
    Approve(ModerateJob),
    Reject(ModerateJob),
    Feature(FeatureJob),
    /// Clears the featured flag once `featured_expiry` has passed.
    ExpireFeatured(JobTransition),
    PromoteHot(PromoteHot),
    /// Clears the hot flag once `hot_until` has passed.
    ExpireHot(JobTransition),
    Close(JobTransition),
    Archive(JobTransition),
    /// Moves a published job past its application deadline to `Expired`.
    Expire(JobTransition),
}

impl JobCommand {
    pub fn job_id(&self) -> JobId {
        match self {
            JobCommand::Create(c) => c.job_id,
            JobCommand::Approve(c) | JobCommand::Reject(c) => c.job_id,
            JobCommand::Feature(c) => c.job_id,
            JobCommand::PromoteHot(c) => c.job_id,
            JobCommand::ExpireFeatured(c)
            | JobCommand::ExpireHot(c)
            | JobCommand::Close(c)
            | JobCommand::Archive(c)
            | JobCommand::Expire(c) => c.job_id,
        }
    }
}

/// Event: JobCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: JobId,
    pub slug: String,
    pub details: JobDetails,
    pub posted_by: UserId,
    pub featured_requested: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRejected {
    pub job_id: JobId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobFeatureGranted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFeatureGranted {
    pub job_id: JobId,
    pub expires_at: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobMarkedHot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMarkedHot {
    pub job_id: JobId,
    pub hot_until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Events that carry nothing but the target and the business time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTransitioned {
    pub job_id: JobId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEvent {
    Created(JobCreated),
    Published(JobTransitioned),
    Rejected(JobRejected),
    Featured(JobFeatureGranted),
    FeaturedExpired(JobTransitioned),
    MarkedHot(JobMarkedHot),
    HotExpired(JobTransitioned),
    Closed(JobTransitioned),
    Archived(JobTransitioned),
    Expired(JobTransitioned),
}

impl Event for JobEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobEvent::Created(_) => "jobs.job.created",
            JobEvent::Published(_) => "jobs.job.published",
            JobEvent::Rejected(_) => "jobs.job.rejected",
            JobEvent::Featured(_) => "jobs.job.featured",
            JobEvent::FeaturedExpired(_) => "jobs.job.featured_expired",
            JobEvent::MarkedHot(_) => "jobs.job.marked_hot",
            JobEvent::HotExpired(_) => "jobs.job.hot_expired",
            JobEvent::Closed(_) => "jobs.job.closed",
            JobEvent::Archived(_) => "jobs.job.archived",
            JobEvent::Expired(_) => "jobs.job.expired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Created(e) => e.occurred_at,
            JobEvent::Rejected(e) => e.occurred_at,
            JobEvent::Featured(e) => e.occurred_at,
            JobEvent::MarkedHot(e) => e.occurred_at,
            JobEvent::Published(e)
            | JobEvent::FeaturedExpired(e)
            | JobEvent::HotExpired(e)
            | JobEvent::Closed(e)
            | JobEvent::Archived(e)
            | JobEvent::Expired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Job {
    type Command = JobCommand;
    type Event = JobEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JobEvent::Created(e) => {
                self.id = e.job_id;
                self.slug = e.slug.clone();
                self.details = e.details.clone();
                self.posted_by = e.posted_by;
                self.status = JobStatus::Pending;
                self.featured_requested = e.featured_requested;
                self.created_at = e.occurred_at;
                self.created = true;
            }
            JobEvent::Published(_) => {
                self.status = JobStatus::Published;
                self.rejection_reason = None;
            }
            JobEvent::Rejected(e) => {
                self.status = JobStatus::Rejected;
                self.rejection_reason = e.reason.clone();
                self.featured_requested = false;
            }
            JobEvent::Featured(e) => {
                self.is_featured = true;
                self.featured_expiry = e.expires_at;
                self.featured_requested = false;
            }
            JobEvent::FeaturedExpired(_) => {
                self.is_featured = false;
                self.featured_expiry = None;
            }
            JobEvent::MarkedHot(e) => {
                self.is_hot = true;
                self.hot_until = Some(e.hot_until);
            }
            JobEvent::HotExpired(_) => {
                self.is_hot = false;
                self.hot_until = None;
            }
            JobEvent::Closed(_) => self.leave_published(JobStatus::Closed),
            JobEvent::Archived(_) => self.leave_published(JobStatus::Archived),
            JobEvent::Expired(_) => self.leave_published(JobStatus::Expired),
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JobCommand::Create(cmd) => self.handle_create(cmd),
            JobCommand::Approve(cmd) => self.handle_approve(cmd),
            JobCommand::Reject(cmd) => self.handle_reject(cmd),
            JobCommand::Feature(cmd) => self.handle_feature(cmd),
            JobCommand::ExpireFeatured(cmd) => self.handle_expire_featured(cmd),
            JobCommand::PromoteHot(cmd) => self.handle_promote_hot(cmd),
            JobCommand::ExpireHot(cmd) => self.handle_expire_hot(cmd),
            JobCommand::Close(cmd) => {
                self.ensure_published(cmd.job_id, "closed")?;
                Ok(vec![JobEvent::Closed(transitioned(cmd))])
            }
            JobCommand::Archive(cmd) => {
                self.ensure_published(cmd.job_id, "archived")?;
                Ok(vec![JobEvent::Archived(transitioned(cmd))])
            }
            JobCommand::Expire(cmd) => self.handle_expire(cmd),
        }
    }
}

fn transitioned(cmd: &JobTransition) -> JobTransitioned {
    JobTransitioned {
        job_id: cmd.job_id,
        occurred_at: cmd.occurred_at,
    }
}

impl Job {
    fn leave_published(&mut self, status: JobStatus) {
        self.status = status;
        self.is_featured = false;
        self.featured_expiry = None;
        self.is_hot = false;
        self.hot_until = None;
    }

    fn ensure_exists(&self, job_id: JobId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("job"));
        }
        if self.id != job_id {
            return Err(DomainError::invariant("job_id mismatch"));
        }
        Ok(())
    }

    fn ensure_published(&self, job_id: JobId, action: &str) -> Result<(), DomainError> {
        self.ensure_exists(job_id)?;
        if self.status != JobStatus::Published {
            return Err(DomainError::invariant(format!(
                "only published jobs can be {action} (status: {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn ensure_pending(&self, job_id: JobId, action: &str) -> Result<(), DomainError> {
        self.ensure_exists(job_id)?;
        if self.status != JobStatus::Pending {
            return Err(DomainError::invariant(format!(
                "only pending jobs can be {action} (status: {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateJob) -> Result<Vec<JobEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("job already exists"));
        }
        if cmd.slug.trim().is_empty() {
            return Err(DomainError::validation("slug cannot be empty"));
        }
        Ok(vec![JobEvent::Created(JobCreated {
            job_id: cmd.job_id,
            slug: cmd.slug.clone(),
            details: cmd.details.clone(),
            posted_by: cmd.posted_by,
            featured_requested: cmd.featured_requested,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ModerateJob) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_pending(cmd.job_id, "approved")?;
        Ok(vec![JobEvent::Published(JobTransitioned {
            job_id: cmd.job_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &ModerateJob) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_pending(cmd.job_id, "rejected")?;
        Ok(vec![JobEvent::Rejected(JobRejected {
            job_id: cmd.job_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_feature(&self, cmd: &FeatureJob) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_published(cmd.job_id, "featured")?;
        if self.is_featured {
            return Err(DomainError::conflict("job is already featured"));
        }
        if cmd.expires_at.is_some_and(|expires_at| expires_at <= cmd.occurred_at) {
            return Err(DomainError::invariant(
                "featured expiry must be in the future",
            ));
        }
        Ok(vec![JobEvent::Featured(JobFeatureGranted {
            job_id: cmd.job_id,
            expires_at: cmd.expires_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire_featured(&self, cmd: &JobTransition) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_exists(cmd.job_id)?;
        match (self.is_featured, self.featured_expiry) {
            (true, Some(expiry)) if expiry <= cmd.occurred_at => {
                Ok(vec![JobEvent::FeaturedExpired(transitioned(cmd))])
            }
            _ => Ok(vec![]),
        }
    }

    fn handle_promote_hot(&self, cmd: &PromoteHot) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_published(cmd.job_id, "marked hot")?;
        if self.is_hot {
            return Ok(vec![]);
        }
        if cmd.hot_until <= cmd.occurred_at {
            return Err(DomainError::invariant("hot window must end in the future"));
        }
        Ok(vec![JobEvent::MarkedHot(JobMarkedHot {
            job_id: cmd.job_id,
            hot_until: cmd.hot_until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expire_hot(&self, cmd: &JobTransition) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_exists(cmd.job_id)?;
        match (self.is_hot, self.hot_until) {
            (true, Some(until)) if until <= cmd.occurred_at => {
                Ok(vec![JobEvent::HotExpired(transitioned(cmd))])
            }
            (true, None) => Ok(vec![JobEvent::HotExpired(transitioned(cmd))]),
            _ => Ok(vec![]),
        }
    }

    fn handle_expire(&self, cmd: &JobTransition) -> Result<Vec<JobEvent>, DomainError> {
        self.ensure_exists(cmd.job_id)?;
        if self.status != JobStatus::Published {
            return Ok(vec![]);
        }
        if self.details.application_deadline > cmd.occurred_at {
            return Err(DomainError::invariant(
                "application deadline has not passed yet",
            ));
        }
        Ok(vec![JobEvent::Expired(transitioned(cmd))])
    }
}
