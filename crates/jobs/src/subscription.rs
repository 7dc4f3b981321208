//! Plan quota checks against the cached subscription snapshot.
//!
//! The snapshot is whatever the subscription cache last saw; a missing snapshot
//! means admission cannot be decided and the request is refused.

use chrono::{DateTime, Utc};

use jobmesh_core::{CompanyId, DomainError, DomainResult};

pub use jobmesh_events::integration::SubscriptionSnapshot;

/// Fail closed on a cache miss.
pub fn require_snapshot(
    snapshot: Option<SubscriptionSnapshot>,
    company: CompanyId,
) -> DomainResult<SubscriptionSnapshot> {
    snapshot.ok_or_else(|| {
        DomainError::quota_unavailable(format!(
            "company subscription not found for company {company}"
        ))
    })
}

/// Limits evaluated by the job store at insert time, under its write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionQuota {
    pub job_post_limit: u32,
    /// `Some` only when the new job asks for a featured slot.
    pub featured_jobs_limit: Option<u32>,
}

impl AdmissionQuota {
    pub fn for_creation(snapshot: &SubscriptionSnapshot, wants_featured: bool) -> Self {
        Self {
            job_post_limit: snapshot.job_post_limit,
            featured_jobs_limit: wants_featured.then_some(snapshot.featured_jobs_limit),
        }
    }

    /// `jobs` and `featured` are the company's current counts, excluding the new job.
    pub fn check(&self, jobs: u64, featured: u64) -> DomainResult<()> {
        check_job_quota(self.job_post_limit, jobs)?;
        if let Some(limit) = self.featured_jobs_limit {
            check_featured_quota(limit, featured)?;
        }
        Ok(())
    }
}

pub fn check_job_quota(limit: u32, existing: u64) -> DomainResult<()> {
    if existing >= u64::from(limit) {
        return Err(DomainError::quota_exceeded(format!(
            "your plan allows only {limit} jobs"
        )));
    }
    Ok(())
}

pub fn check_featured_quota(limit: u32, existing_featured: u64) -> DomainResult<()> {
    if existing_featured >= u64::from(limit) {
        return Err(DomainError::quota_exceeded(format!(
            "your plan allows only {limit} featured jobs"
        )));
    }
    Ok(())
}

/// A featured slot lasts until the subscription ends.
///
/// An already-ended subscription cannot grant new featured slots.
pub fn featured_expiry(
    snapshot: &SubscriptionSnapshot,
    now: DateTime<Utc>,
) -> DomainResult<Option<DateTime<Utc>>> {
    match snapshot.end_date {
        Some(end) if end <= now => Err(DomainError::quota_exceeded(
            "subscription has ended; featured placement is unavailable",
        )),
        other => Ok(other),
    }
}
