use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobmesh_core::{ApplicationId, CompanyId, JobId, NotificationId, UserId};
use jobmesh_events::integration::{NotificationAction, Priority};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    #[default]
    Pending,
    Sent,
    Failed,
    Skipped,
}

/// Per-channel outcome. Only push is attempted; email and sms stay skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub push: DeliveryState,
    pub email: DeliveryState,
    pub sms: DeliveryState,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self {
            push: DeliveryState::Pending,
            email: DeliveryState::Skipped,
            sms: DeliveryState::Skipped,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<ApplicationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_date: Option<DateTime<Utc>>,
}

impl NotificationMetadata {
    /// Flattened string pairs for push payloads. Empty values are dropped.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.job_id {
            pairs.push(("jobId", id.to_string()));
        }
        if let Some(slug) = &self.job_slug {
            pairs.push(("jobSlug", slug.clone()));
        }
        if let Some(id) = self.application_id {
            pairs.push(("applicationId", id.to_string()));
        }
        if let Some(id) = self.company_id {
            pairs.push(("companyId", id.to_string()));
        }
        if let Some(at) = self.interview_date {
            pairs.push(("interviewDate", at.to_rfc3339()));
        }
        pairs
    }
}

/// What a template produces for one event, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub priority: Priority,
    pub metadata: NotificationMetadata,
    pub actions: Vec<NotificationAction>,
}

/// A user's in-app notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: Priority,
    pub is_read: bool,
    pub metadata: NotificationMetadata,
    pub actions: Vec<NotificationAction>,
    pub delivery_status: DeliveryStatus,
    /// Event this notification was created from; at most one row per event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        draft: NotificationDraft,
        source_event_id: Option<Uuid>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id: draft.user_id,
            title: draft.title,
            message: draft.message,
            kind: draft.kind,
            priority: draft.priority,
            is_read: false,
            metadata: draft.metadata,
            actions: draft.actions,
            delivery_status: DeliveryStatus::default(),
            source_event_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
