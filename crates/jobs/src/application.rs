use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobmesh_core::{ApplicationId, DomainError, DomainResult, JobId, UserId};
use jobmesh_events::integration::{ApplicationStatus, NotificationAction, Priority};

/// One entry of the append-only status audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: UserId,
    pub notes: Option<String>,
}

/// A candidate's application to a job. At most one exists per `(job_id, user_id)`;
/// the store enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    id: ApplicationId,
    job_id: JobId,
    user_id: UserId,
    resume_url: String,
    cover_letter: Option<String>,
    status: ApplicationStatus,
    notes: Option<String>,
    applied_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status_history: Vec<StatusChange>,
}

impl Application {
    pub fn submit(
        job_id: JobId,
        user_id: UserId,
        resume_url: impl Into<String>,
        cover_letter: Option<String>,
        applied_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let resume_url = resume_url.into().trim().to_string();
        if resume_url.is_empty() {
            return Err(DomainError::validation("resume is required"));
        }
        Ok(Self {
            id: ApplicationId::new(),
            job_id,
            user_id,
            resume_url,
            cover_letter: cover_letter.filter(|c| !c.trim().is_empty()),
            status: ApplicationStatus::Pending,
            notes: None,
            applied_at,
            updated_at: applied_at,
            status_history: Vec::new(),
        })
    }

    pub fn id(&self) -> ApplicationId {
        self.id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn resume_url(&self) -> &str {
        &self.resume_url
    }

    pub fn cover_letter(&self) -> Option<&str> {
        self.cover_letter.as_deref()
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    /// Move to `status`. Returns the previous status when it actually changed;
    /// the history grows only in that case. Notes are kept either way.
    pub fn change_status(
        &mut self,
        status: ApplicationStatus,
        changed_by: UserId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Option<ApplicationStatus> {
        let notes = notes.filter(|n| !n.trim().is_empty());
        if notes.is_some() {
            self.notes = notes.clone();
        }
        self.updated_at = at;

        if self.status == status {
            return None;
        }
        let old = self.status;
        self.status = status;
        self.status_history.push(StatusChange {
            status,
            changed_at: at,
            changed_by,
            notes,
        });
        Some(old)
    }
}

/// Candidate-facing wording for a status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusNotice {
    pub message: String,
    pub priority: Priority,
    pub actions: Vec<NotificationAction>,
}

pub fn status_notice(
    status: ApplicationStatus,
    job_title: &str,
    job_slug: &str,
    application_id: ApplicationId,
) -> StatusNotice {
    let message = match status {
        ApplicationStatus::Accepted => format!(
            "Congratulations! Your application for \"{job_title}\" has been accepted. We will contact you soon to discuss next steps."
        ),
        ApplicationStatus::Rejected => format!(
            "Unfortunately, your application for \"{job_title}\" was not accepted. Thank you for your interest."
        ),
        ApplicationStatus::InterviewScheduled => format!(
            "You have been invited to interview for \"{job_title}\". Please check your email for details."
        ),
        ApplicationStatus::InReview => format!(
            "Your application for \"{job_title}\" is now under review. We will let you know when there is an update."
        ),
        ApplicationStatus::Pending => format!(
            "The status of your application for \"{job_title}\" was updated: {}.",
            status.as_str()
        ),
    };

    let priority = match status {
        ApplicationStatus::Accepted | ApplicationStatus::InterviewScheduled => Priority::High,
        _ => Priority::Medium,
    };

    let actions = match status {
        ApplicationStatus::InterviewScheduled => vec![NotificationAction::link(
            "View details",
            format!("/applications/{application_id}"),
        )],
        ApplicationStatus::Accepted => {
            vec![NotificationAction::link("View job", format!("/jobs/{job_slug}"))]
        }
        _ => Vec::new(),
    };

    StatusNotice {
        message,
        priority,
        actions,
    }
}
