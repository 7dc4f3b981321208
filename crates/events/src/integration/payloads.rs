//! Payload structs, one per routing key. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobmesh_core::{ApplicationId, CompanyId, JobId, UserId};

use super::types::{
    ApplicationStatus, JobStatus, JobType, NotificationAction, Priority, SubscriptionSnapshot,
};

/// `company.created`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyCreated {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub subscription: SubscriptionSnapshot,
}

/// `company.verified`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyVerified {
    pub company_id: CompanyId,
    pub name: String,
    pub user_id: UserId,
    pub message: String,
}

/// `company.subscription.updated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdated {
    pub company_id: CompanyId,
    pub subscription: SubscriptionSnapshot,
    pub user_id: UserId,
    pub message: String,
}

/// `companies.member.accepted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberAccepted {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub company_name: String,
}

/// `companies.member.invited`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInvited {
    pub company_id: CompanyId,
    pub user_email: String,
    pub invited_by: UserId,
    pub message: String,
}

/// `identify.user.invited` (re-emitted by Identity once the invitee is resolved)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInvited {
    pub user_id: UserId,
    pub company_id: CompanyId,
    #[serde(default)]
    pub company_name: Option<String>,
    pub message: String,
}

/// Denormalized job snapshot carried by `job.created` and `job.published`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub company: CompanyId,
    pub company_name: String,
    pub location: String,
    pub salary: u64,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub job_type: JobType,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub status: JobStatus,
    pub is_featured: bool,
    #[serde(default)]
    pub featured_expiry: Option<DateTime<Utc>>,
    pub is_hot: bool,
    #[serde(default)]
    pub hot_until: Option<DateTime<Utc>>,
    pub application_deadline: DateTime<Utc>,
    pub posted_by: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `job.deleted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDeleted {
    pub job_id: JobId,
    pub slug: String,
    pub company: CompanyId,
    pub status: JobStatus,
}

/// `job.featured`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFeatured {
    pub job_id: JobId,
    pub slug: String,
    pub is_featured: bool,
    #[serde(default)]
    pub featured_expiry: Option<DateTime<Utc>>,
}

/// `job.hot`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHot {
    pub job_id: JobId,
    pub slug: String,
    pub is_hot: bool,
    #[serde(default)]
    pub hot_until: Option<DateTime<Utc>>,
    pub title: String,
    pub posted_by: UserId,
}

/// `job.status.changed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusChanged {
    pub job_id: JobId,
    pub slug: String,
    pub status: JobStatus,
}

/// `job.application` (addressed to the job's poster)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplicationReceived {
    pub user_id: UserId,
    pub job_id: JobId,
    pub job_slug: String,
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusMetadata {
    pub job_slug: String,
    pub job_title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub interview_date: Option<DateTime<Utc>>,
}

/// `application.status.updated` (addressed to the applicant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusUpdated {
    pub user_id: UserId,
    pub job_id: JobId,
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub old_status: ApplicationStatus,
    pub message: String,
    pub priority: Priority,
    pub metadata: ApplicationStatusMetadata,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

/// `job.save`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSaved {
    pub user_id: UserId,
    pub job_id: JobId,
    pub job_slug: String,
    pub message: String,
}
