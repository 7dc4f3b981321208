use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use jobmesh_core::{JobId, UserId};

use crate::error::StoreError;

/// A job bookmarked by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJob {
    pub user_id: UserId,
    pub job_id: JobId,
    pub saved_at: DateTime<Utc>,
}

pub trait SavedJobRepository: Send + Sync {
    /// Save when absent, unsave when present. Returns whether the job is now saved.
    fn toggle(&self, user_id: UserId, job_id: JobId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    fn is_saved(&self, user_id: UserId, job_id: JobId) -> Result<bool, StoreError>;

    /// Most recently saved first.
    fn list_for_user(&self, user_id: UserId) -> Result<Vec<SavedJob>, StoreError>;

    fn delete_for_job(&self, job_id: JobId) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemorySavedJobStore {
    inner: RwLock<HashMap<(UserId, JobId), SavedJob>>,
}

impl InMemorySavedJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SavedJobRepository for InMemorySavedJobStore {
    fn toggle(&self, user_id: UserId, job_id: JobId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut saved = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if saved.remove(&(user_id, job_id)).is_some() {
            return Ok(false);
        }
        saved.insert(
            (user_id, job_id),
            SavedJob {
                user_id,
                job_id,
                saved_at: at,
            },
        );
        Ok(true)
    }

    fn is_saved(&self, user_id: UserId, job_id: JobId) -> Result<bool, StoreError> {
        let saved = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(saved.contains_key(&(user_id, job_id)))
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<SavedJob>, StoreError> {
        let saved = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut list: Vec<SavedJob> = saved
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.job_id.cmp(&b.job_id)));
        Ok(list)
    }

    fn delete_for_job(&self, job_id: JobId) -> Result<usize, StoreError> {
        let mut saved = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let before = saved.len();
        saved.retain(|(_, job), _| *job != job_id);
        Ok(before - saved.len())
    }
}
