use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use jobmesh_auth::Actor;
use jobmesh_core::{DomainError, JobId};
use jobmesh_events::IntegrationEvent;
use jobmesh_events::integration::JobSaved;

use crate::error::ServiceResult;
use crate::publisher::Publisher;
use crate::store::{JobRepository, SavedJob, SavedJobRepository};

pub struct SavedJobService {
    jobs: Arc<dyn JobRepository>,
    saved: Arc<dyn SavedJobRepository>,
    publisher: Arc<dyn Publisher>,
}

impl SavedJobService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        saved: Arc<dyn SavedJobRepository>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            jobs,
            saved,
            publisher,
        }
    }

    /// Save or unsave. Returns whether the job is saved afterwards; only a
    /// save is announced.
    pub fn toggle(&self, job_id: JobId, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<bool> {
        let job = self
            .jobs
            .get(job_id)?
            .ok_or_else(|| DomainError::not_found("job"))?;
        let saved = self.saved.toggle(actor.user_id(), job_id, now)?;
        info!(job_id = %job_id, user_id = %actor.user_id(), saved, "saved job toggled");

        if saved {
            self.publisher.publish_event(&IntegrationEvent::JobSaved(JobSaved {
                user_id: actor.user_id(),
                job_id,
                job_slug: job.slug().to_string(),
                message: format!("Job \"{}\" saved", job.title()),
            }))?;
        }
        Ok(saved)
    }

    pub fn is_saved(&self, job_id: JobId, actor: &Actor) -> ServiceResult<bool> {
        Ok(self.saved.is_saved(actor.user_id(), job_id)?)
    }

    pub fn list(&self, actor: &Actor) -> ServiceResult<Vec<SavedJob>> {
        Ok(self.saved.list_for_user(actor.user_id())?)
    }
}
