//! Subscription cache: `subscription:{companyId}` → JSON snapshot.
//!
//! Written only by [`SubscriptionCacheConsumer`] (last write wins, no TTL) and
//! read by job admission. A miss means "subscription unknown".

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::info;

use jobmesh_core::CompanyId;
use jobmesh_events::{EventEnvelope, EventHandler, HandlerError, IntegrationEvent};
use jobmesh_jobs::SubscriptionSnapshot;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "redis")]
pub use redis_cache::RedisSubscriptionCache;

pub fn cache_key(company_id: CompanyId) -> String {
    format!("subscription:{company_id}")
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub trait SubscriptionCache: Send + Sync {
    fn get(&self, company_id: CompanyId) -> Result<Option<SubscriptionSnapshot>, CacheError>;

    /// Overwrite the entry for `company_id`.
    fn put(&self, company_id: CompanyId, snapshot: &SubscriptionSnapshot) -> Result<(), CacheError>;
}

impl<C> SubscriptionCache for std::sync::Arc<C>
where
    C: SubscriptionCache + ?Sized,
{
    fn get(&self, company_id: CompanyId) -> Result<Option<SubscriptionSnapshot>, CacheError> {
        (**self).get(company_id)
    }

    fn put(&self, company_id: CompanyId, snapshot: &SubscriptionSnapshot) -> Result<(), CacheError> {
        (**self).put(company_id, snapshot)
    }
}

impl<C> SubscriptionCache for &C
where
    C: SubscriptionCache + ?Sized,
{
    fn get(&self, company_id: CompanyId) -> Result<Option<SubscriptionSnapshot>, CacheError> {
        (**self).get(company_id)
    }

    fn put(&self, company_id: CompanyId, snapshot: &SubscriptionSnapshot) -> Result<(), CacheError> {
        (**self).put(company_id, snapshot)
    }
}

pub(crate) fn encode(key: &str, snapshot: &SubscriptionSnapshot) -> Result<String, CacheError> {
    serde_json::to_string(snapshot).map_err(|e| CacheError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn decode(key: &str, raw: &str) -> Result<SubscriptionSnapshot, CacheError> {
    serde_json::from_str(raw).map_err(|e| CacheError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// In-process cache holding the same JSON strings the Redis adapter stores.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemorySubscriptionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionCache for InMemorySubscriptionCache {
    fn get(&self, company_id: CompanyId) -> Result<Option<SubscriptionSnapshot>, CacheError> {
        let key = cache_key(company_id);
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        entries.get(&key).map(|raw| decode(&key, raw)).transpose()
    }

    fn put(&self, company_id: CompanyId, snapshot: &SubscriptionSnapshot) -> Result<(), CacheError> {
        let key = cache_key(company_id);
        let raw = encode(&key, snapshot)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        entries.insert(key, raw);
        Ok(())
    }
}

/// Keeps the cache in step with the Company service's announcements.
pub struct SubscriptionCacheConsumer<C> {
    cache: C,
}

impl<C: SubscriptionCache> SubscriptionCacheConsumer<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }
}

impl<C: SubscriptionCache> EventHandler for SubscriptionCacheConsumer<C> {
    fn name(&self) -> &'static str {
        "job.subscription-cache"
    }

    fn bindings(&self) -> Vec<&'static str> {
        vec!["company.created", "company.subscription.updated"]
    }

    fn handle(&self, envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError> {
        let (company_id, snapshot) = match envelope.payload() {
            IntegrationEvent::CompanyCreated(e) => (e.company_id, &e.subscription),
            IntegrationEvent::SubscriptionUpdated(e) => (e.company_id, &e.subscription),
            _ => return Ok(()),
        };

        self.cache
            .put(company_id, snapshot)
            .map_err(|e| HandlerError::Dependency(e.to_string()))?;

        info!(
            company_id = %company_id,
            plan = ?snapshot.plan,
            job_post_limit = snapshot.job_post_limit,
            featured_jobs_limit = snapshot.featured_jobs_limit,
            "subscription cached"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmesh_core::UserId;
    use jobmesh_events::integration::{CompanyCreated, Plan, SubscriptionUpdated};

    fn snapshot(plan: Plan, jobs: u32, featured: u32) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            plan,
            billing_cycle: Default::default(),
            start_date: None,
            end_date: None,
            job_post_limit: jobs,
            featured_jobs_limit: featured,
        }
    }

    #[test]
    fn miss_is_none_not_a_default_plan() {
        let cache = InMemorySubscriptionCache::new();
        assert!(cache.get(CompanyId::new()).unwrap().is_none());
    }

    #[test]
    fn update_overwrites_without_merging() {
        let cache = InMemorySubscriptionCache::new();
        let consumer = SubscriptionCacheConsumer::new(&cache);
        let company_id = CompanyId::new();

        let created = IntegrationEvent::CompanyCreated(CompanyCreated {
            company_id,
            user_id: UserId::new(),
            subscription: snapshot(Plan::Premium, 50, 10),
        });
        consumer.handle(&EventEnvelope::new("company.created", created)).unwrap();

        let updated = IntegrationEvent::SubscriptionUpdated(SubscriptionUpdated {
            company_id,
            subscription: snapshot(Plan::Free, 3, 0),
            user_id: UserId::new(),
            message: "downgraded".into(),
        });
        consumer
            .handle(&EventEnvelope::new("company.subscription.updated", updated))
            .unwrap();

        assert_eq!(cache.get(company_id).unwrap(), Some(snapshot(Plan::Free, 3, 0)));
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let cache = InMemorySubscriptionCache::new();
        let company_id = CompanyId::new();
        cache
            .entries
            .write()
            .unwrap()
            .insert(cache_key(company_id), "{not json".into());

        assert!(matches!(cache.get(company_id), Err(CacheError::Corrupt { .. })));
    }
}
