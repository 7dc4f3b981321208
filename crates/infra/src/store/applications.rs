use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use jobmesh_core::{ApplicationId, DomainError, JobId, UserId};
use jobmesh_jobs::Application;

use crate::error::StoreError;

pub trait ApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when the `(job, user)` pair already applied.
    fn insert(&self, application: Application) -> Result<(), StoreError>;

    fn get(&self, id: ApplicationId) -> Result<Option<Application>, StoreError>;

    fn update(&self, application: &Application) -> Result<(), StoreError>;

    fn find_by_job_and_user(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<Option<Application>, StoreError>;

    /// Newest first.
    fn list_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StoreError>;

    /// Newest first.
    fn list_for_user(&self, user_id: UserId) -> Result<Vec<Application>, StoreError>;

    /// Applications to `job_id` submitted at or after `since`.
    fn count_for_job_since(&self, job_id: JobId, since: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Per-job application counts at or after `since`.
    fn counts_since(&self, since: DateTime<Utc>) -> Result<HashMap<JobId, u64>, StoreError>;

    fn delete_for_job(&self, job_id: JobId) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
struct ApplicationTable {
    by_id: HashMap<ApplicationId, Application>,
    by_pair: HashMap<(JobId, UserId), ApplicationId>,
}

/// In-memory application store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    inner: RwLock<ApplicationTable>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect_sorted(
        &self,
        keep: impl Fn(&Application) -> bool,
    ) -> Result<Vec<Application>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut apps: Vec<Application> = table.by_id.values().filter(|a| keep(a)).cloned().collect();
        apps.sort_by(|a, b| b.applied_at().cmp(&a.applied_at()).then_with(|| a.id().cmp(&b.id())));
        Ok(apps)
    }
}

impl ApplicationRepository for InMemoryApplicationStore {
    fn insert(&self, application: Application) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let pair = (application.job_id(), application.user_id());
        if table.by_pair.contains_key(&pair) {
            return Err(DomainError::conflict("you have already applied for this job").into());
        }
        table.by_pair.insert(pair, application.id());
        table.by_id.insert(application.id(), application);
        Ok(())
    }

    fn get(&self, id: ApplicationId) -> Result<Option<Application>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.by_id.get(&id).cloned())
    }

    fn update(&self, application: &Application) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        match table.by_id.get_mut(&application.id()) {
            Some(slot) => {
                *slot = application.clone();
                Ok(())
            }
            None => Err(DomainError::not_found("application").into()),
        }
    }

    fn find_by_job_and_user(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<Option<Application>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table
            .by_pair
            .get(&(job_id, user_id))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    fn list_for_job(&self, job_id: JobId) -> Result<Vec<Application>, StoreError> {
        self.collect_sorted(|a| a.job_id() == job_id)
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<Application>, StoreError> {
        self.collect_sorted(|a| a.user_id() == user_id)
    }

    fn count_for_job_since(&self, job_id: JobId, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table
            .by_id
            .values()
            .filter(|a| a.job_id() == job_id && a.applied_at() >= since)
            .count() as u64)
    }

    fn counts_since(&self, since: DateTime<Utc>) -> Result<HashMap<JobId, u64>, StoreError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut counts = HashMap::new();
        for app in table.by_id.values().filter(|a| a.applied_at() >= since) {
            *counts.entry(app.job_id()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn delete_for_job(&self, job_id: JobId) -> Result<usize, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let before = table.by_id.len();
        table.by_id.retain(|_, a| a.job_id() != job_id);
        table.by_pair.retain(|(job, _), _| *job != job_id);
        Ok(before - table.by_id.len())
    }
}
