//! Authoritative record stores.
//!
//! Each store guards its table with a single `RwLock`; every multi-step check
//! (quota counts, slug uniqueness, `(job, user)` uniqueness) runs under the write
//! lock, which gives the conditional-write semantics the services rely on.

pub mod applications;
pub mod jobs;
pub mod saved_jobs;

pub use applications::{ApplicationRepository, InMemoryApplicationStore};
pub use jobs::{Executed, InMemoryJobStore, JobFilter, JobRepository};
pub use saved_jobs::{InMemorySavedJobStore, SavedJob, SavedJobRepository};
