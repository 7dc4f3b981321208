//! Redis-backed subscription cache (plain `GET`/`SET`, no TTL).

use std::sync::Arc;

use jobmesh_core::CompanyId;
use jobmesh_jobs::SubscriptionSnapshot;

use super::{CacheError, SubscriptionCache, cache_key, decode, encode};

#[derive(Debug, Clone)]
pub struct RedisSubscriptionCache {
    client: Arc<redis::Client>,
}

impl RedisSubscriptionCache {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    fn connection(&self) -> Result<redis::Connection, CacheError> {
        self.client
            .get_connection()
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    /// Round-trip check used by startup retry.
    pub fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING")
            .query(&mut conn)
            .map_err(|e| CacheError::Unavailable(format!("PING failed: {e}")))?;
        Ok(())
    }
}

impl SubscriptionCache for RedisSubscriptionCache {
    fn get(&self, company_id: CompanyId) -> Result<Option<SubscriptionSnapshot>, CacheError> {
        let key = cache_key(company_id);
        let mut conn = self.connection()?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query(&mut conn)
            .map_err(|e| CacheError::Unavailable(format!("GET failed: {e}")))?;
        raw.map(|r| decode(&key, &r)).transpose()
    }

    fn put(&self, company_id: CompanyId, snapshot: &SubscriptionSnapshot) -> Result<(), CacheError> {
        let key = cache_key(company_id);
        let raw = encode(&key, snapshot)?;
        let mut conn = self.connection()?;
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(raw)
            .query(&mut conn)
            .map_err(|e| CacheError::Unavailable(format!("SET failed: {e}")))?;
        Ok(())
    }
}
