//! Job marketplace domain module.
//!
//! This crate contains the business rules for job postings and applications,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - [`job`]: the `Job` aggregate and its lifecycle state machine
//! - [`application`]: applications with an append-only status history
//! - [`validation`], [`slug`]: admission-time payload checks and slug generation
//! - [`subscription`]: plan quota checks against a subscription snapshot
//! - [`trending`]: thresholds shared by the scheduled and ad-hoc hot checks
//! - [`similarity`]: "similar jobs" scoring
//! - [`outbound`]: mapping state-machine events to integration events

pub mod application;
pub mod job;
pub mod outbound;
pub mod similarity;
pub mod slug;
pub mod subscription;
pub mod trending;
pub mod validation;

pub use application::{Application, StatusChange, StatusNotice, status_notice};
pub use job::{
    CreateJob, FeatureJob, Job, JobCommand, JobCreated, JobDetails, JobEvent, JobFeatureGranted,
    JobMarkedHot, JobRejected, JobTransition, JobTransitioned, ModerateJob, PromoteHot,
};
pub use jobmesh_events::integration::{ApplicationStatus, JobStatus, JobType};
pub use subscription::{AdmissionQuota, SubscriptionSnapshot};
pub use trending::TrendingPolicy;
pub use validation::JobDraft;
