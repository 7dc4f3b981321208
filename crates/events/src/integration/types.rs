//! Shared vocabulary carried inside integration payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Main lifecycle state of a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Draft,
    Pending,
    Published,
    Closed,
    Expired,
    Archived,
    Rejected,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Draft => "Draft",
            JobStatus::Pending => "Pending",
            JobStatus::Published => "Published",
            JobStatus::Closed => "Closed",
            JobStatus::Expired => "Expired",
            JobStatus::Archived => "Archived",
            JobStatus::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Freelance,
    Internship,
    Remote,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "Full-time",
            JobType::PartTime => "Part-time",
            JobType::Contract => "Contract",
            JobType::Freelance => "Freelance",
            JobType::Internship => "Internship",
            JobType::Remote => "Remote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            JobType::FullTime,
            JobType::PartTime,
            JobType::Contract,
            JobType::Freelance,
            JobType::Internship,
            JobType::Remote,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    #[serde(rename = "In Review")]
    InReview,
    #[serde(rename = "Interview Scheduled")]
    InterviewScheduled,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::InReview => "In Review",
            ApplicationStatus::InterviewScheduled => "Interview Scheduled",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Accepted => "Accepted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Annually,
}

fn default_job_post_limit() -> u32 {
    3
}

/// A company's subscription as last announced by the Company service.
///
/// Stored verbatim under `subscription:{companyId}`; may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_job_post_limit")]
    pub job_post_limit: u32,
    #[serde(default)]
    pub featured_jobs_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Link,
    ApiCall,
    Dismiss,
}

/// A call-to-action attached to a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl NotificationAction {
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ActionKind::Link,
            url: Some(url.into()),
            method: None,
            payload: None,
        }
    }

    pub fn api_call(label: impl Into<String>, method: &str, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ActionKind::ApiCall,
            url: Some(url.into()),
            method: Some(method.to_string()),
            payload: None,
        }
    }

    pub fn dismiss() -> Self {
        Self {
            label: "Dismiss".to_string(),
            kind: ActionKind::Dismiss,
            url: None,
            method: None,
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_defaults_match_free_tier_shape() {
        let snap: SubscriptionSnapshot = serde_json::from_str(r#"{"plan":"basic"}"#).unwrap();
        assert_eq!(snap.plan, Plan::Basic);
        assert_eq!(snap.job_post_limit, 3);
        assert_eq!(snap.featured_jobs_limit, 0);
        assert!(snap.end_date.is_none());
    }

    #[test]
    fn wire_names_are_human_labels() {
        assert_eq!(serde_json::to_string(&JobType::FullTime).unwrap(), "\"Full-time\"");
        assert_eq!(
            serde_json::to_string(&ApplicationStatus::InterviewScheduled).unwrap(),
            "\"Interview Scheduled\""
        );
        assert_eq!(JobType::parse("part-time"), Some(JobType::PartTime));
        assert_eq!(JobType::parse("gig"), None);
    }
}
