//! Infrastructure error model.
//!
//! Stores report [`StoreError`]; application services report [`ServiceError`],
//! which keeps deterministic domain rejections apart from dependency failures so
//! the HTTP layer can surface the former and hide the details of the latter.

use thiserror::Error;

use jobmesh_auth::AuthzError;
use jobmesh_core::DomainError;
use jobmesh_events::HandlerError;

use crate::cache::CacheError;
use crate::tasks::TaskStoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Another job already owns the slug. Callers regenerate and retry.
    #[error("slug already taken: {0}")]
    SlugTaken(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("storage error: {0}")]
    Storage(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Store, cache or broker unreachable.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The write succeeded but its integration event could not be published.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl ServiceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => ServiceError::Domain(e),
            StoreError::SlugTaken(slug) => {
                ServiceError::Domain(DomainError::conflict(format!("slug already taken: {slug}")))
            }
            StoreError::Poisoned => ServiceError::DependencyUnavailable("store lock poisoned".into()),
            StoreError::Storage(msg) => ServiceError::DependencyUnavailable(msg),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}

impl From<CacheError> for ServiceError {
    fn from(value: CacheError) -> Self {
        ServiceError::DependencyUnavailable(value.to_string())
    }
}

impl From<TaskStoreError> for ServiceError {
    fn from(value: TaskStoreError) -> Self {
        ServiceError::DependencyUnavailable(value.to_string())
    }
}

impl From<ServiceError> for HandlerError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Domain(e) => HandlerError::Processing(e.to_string()),
            ServiceError::DependencyUnavailable(msg) | ServiceError::Publish(msg) => {
                HandlerError::Dependency(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_race_surfaces_as_conflict() {
        let err = ServiceError::from(StoreError::SlugTaken("rust-dev".into()));
        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));
    }

    #[test]
    fn poisoned_store_is_a_dependency_failure() {
        let err = ServiceError::from(StoreError::Poisoned);
        assert!(matches!(err, ServiceError::DependencyUnavailable(_)));
        assert!(matches!(HandlerError::from(err), HandlerError::Dependency(_)));
    }
}
