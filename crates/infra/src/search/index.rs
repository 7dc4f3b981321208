//! Disposable search read model, keyed by slug.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use jobmesh_core::{CompanyId, JobId, UserId};
use jobmesh_events::integration::{JobSnapshot, JobStatus, JobType};

/// One searchable job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub job_id: JobId,
    pub slug: String,
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
    pub status: JobStatus,
    pub is_featured: bool,
    pub featured_expiry: Option<DateTime<Utc>>,
    pub is_hot: bool,
    pub hot_until: Option<DateTime<Utc>>,
    pub application_deadline: DateTime<Utc>,
    pub posted_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<JobSnapshot> for SearchDocument {
    fn from(s: JobSnapshot) -> Self {
        Self {
            job_id: s.job_id,
            slug: s.slug,
            title: s.title,
            description: s.description,
            company: s.company,
            company_name: s.company_name,
            location: s.location,
            salary: s.salary,
            experience: s.experience,
            skills: s.skills,
            job_type: s.job_type,
            benefits: s.benefits,
            category: s.category,
            status: s.status,
            is_featured: s.is_featured,
            featured_expiry: s.featured_expiry,
            is_hot: s.is_hot,
            hot_until: s.hot_until,
            application_deadline: s.application_deadline,
            posted_by: s.posted_by,
            created_at: s.created_at,
        }
    }
}

/// A single-flag update. Patches never touch other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagPatch {
    Featured {
        is_featured: bool,
        featured_expiry: Option<DateTime<Utc>>,
    },
    Hot {
        is_hot: bool,
        hot_until: Option<DateTime<Utc>>,
    },
}

impl FlagPatch {
    fn apply(&self, doc: &mut SearchDocument) {
        match *self {
            FlagPatch::Featured {
                is_featured,
                featured_expiry,
            } => {
                doc.is_featured = is_featured;
                doc.featured_expiry = featured_expiry;
            }
            FlagPatch::Hot { is_hot, hot_until } => {
                doc.is_hot = is_hot;
                doc.hot_until = hot_until;
            }
        }
    }
}

pub trait SearchIndex: Send + Sync {
    fn get(&self, slug: &str) -> Option<SearchDocument>;
    /// Insert or replace the whole document.
    fn upsert(&self, doc: SearchDocument);
    fn remove(&self, slug: &str) -> bool;
    /// Returns `false` when no document has `slug`.
    fn patch(&self, slug: &str, patch: &FlagPatch) -> bool;
    /// Every document, ordered by slug.
    fn all(&self) -> Vec<SearchDocument>;
    fn clear(&self);
}

impl<S> SearchIndex for Arc<S>
where
    S: SearchIndex + ?Sized,
{
    fn get(&self, slug: &str) -> Option<SearchDocument> {
        (**self).get(slug)
    }

    fn upsert(&self, doc: SearchDocument) {
        (**self).upsert(doc)
    }

    fn remove(&self, slug: &str) -> bool {
        (**self).remove(slug)
    }

    fn patch(&self, slug: &str, patch: &FlagPatch) -> bool {
        (**self).patch(slug, patch)
    }

    fn all(&self) -> Vec<SearchDocument> {
        (**self).all()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    inner: RwLock<BTreeMap<String, SearchDocument>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndex for InMemorySearchIndex {
    fn get(&self, slug: &str) -> Option<SearchDocument> {
        let map = self.inner.read().ok()?;
        map.get(slug).cloned()
    }

    fn upsert(&self, doc: SearchDocument) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(doc.slug.clone(), doc);
        }
    }

    fn remove(&self, slug: &str) -> bool {
        match self.inner.write() {
            Ok(mut map) => map.remove(slug).is_some(),
            Err(_) => false,
        }
    }

    fn patch(&self, slug: &str, patch: &FlagPatch) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        match map.get_mut(slug) {
            Some(doc) => {
                patch.apply(doc);
                true
            }
            None => false,
        }
    }

    fn all(&self) -> Vec<SearchDocument> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}
