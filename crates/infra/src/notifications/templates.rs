//! Turns integration events into notification drafts.

use jobmesh_events::IntegrationEvent;
use jobmesh_events::integration::{ApplicationStatus, NotificationAction, Priority};

use super::model::{Notification, NotificationDraft, NotificationMetadata};

/// Routing keys that produce a notification.
pub const NOTIFICATION_BINDINGS: [&str; 8] = [
    "job.published",
    "job.hot",
    "job.application",
    "application.status.updated",
    "job.save",
    "company.verified",
    "company.subscription.updated",
    "identify.user.invited",
];

pub mod kinds {
    pub const JOB_PUBLISHED: &str = "job_published";
    pub const JOB_HOT: &str = "job_hot";
    pub const JOB_SAVED: &str = "job_saved";
    pub const APPLICATION_SUBMITTED: &str = "application_submitted";
    pub const APPLICATION_IN_REVIEW: &str = "application_in_review";
    pub const APPLICATION_INTERVIEW: &str = "application_interview_scheduled";
    pub const APPLICATION_ACCEPTED: &str = "application_accepted";
    pub const APPLICATION_REJECTED: &str = "application_rejected";
    pub const APPLICATION_UPDATED: &str = "application_status_updated";
    pub const COMPANY_VERIFIED: &str = "company_verified";
    pub const SUBSCRIPTION_UPDATED: &str = "subscription_updated";
    pub const COMPANY_INVITATION: &str = "company_invitation";
}

fn application_kind(status: ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::InReview => kinds::APPLICATION_IN_REVIEW,
        ApplicationStatus::InterviewScheduled => kinds::APPLICATION_INTERVIEW,
        ApplicationStatus::Accepted => kinds::APPLICATION_ACCEPTED,
        ApplicationStatus::Rejected => kinds::APPLICATION_REJECTED,
        ApplicationStatus::Pending => kinds::APPLICATION_UPDATED,
    }
}

fn or_default(message: &str, fallback: impl FnOnce() -> String) -> String {
    if message.trim().is_empty() {
        fallback()
    } else {
        message.to_string()
    }
}

/// Draft for `event`, or `None` when the event does not notify anyone.
pub fn render(event: &IntegrationEvent) -> Option<NotificationDraft> {
    let draft = match event {
        IntegrationEvent::JobPublished(job) => NotificationDraft {
            user_id: job.posted_by,
            title: "Job published".into(),
            message: or_default(job.message.as_deref().unwrap_or(""), || {
                format!("Your job \"{}\" is now live", job.title)
            }),
            kind: kinds::JOB_PUBLISHED.into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata {
                job_id: Some(job.job_id),
                job_slug: Some(job.slug.clone()),
                company_id: Some(job.company),
                ..Default::default()
            },
            actions: vec![NotificationAction::link("View job", format!("/jobs/{}", job.slug))],
        },
        // Demotions are silent.
        IntegrationEvent::JobHot(hot) if !hot.is_hot => return None,
        IntegrationEvent::JobHot(hot) => NotificationDraft {
            user_id: hot.posted_by,
            title: "Your job is trending".into(),
            message: format!(
                "\"{}\" is attracting lots of applicants and is now marked as hot",
                hot.title
            ),
            kind: kinds::JOB_HOT.into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata {
                job_id: Some(hot.job_id),
                job_slug: Some(hot.slug.clone()),
                ..Default::default()
            },
            actions: vec![NotificationAction::link("View job", format!("/jobs/{}", hot.slug))],
        },
        IntegrationEvent::JobApplication(app) => NotificationDraft {
            user_id: app.user_id,
            title: "New application".into(),
            message: or_default(&app.message, || "You received a new application".into()),
            kind: kinds::APPLICATION_SUBMITTED.into(),
            priority: Priority::High,
            metadata: NotificationMetadata {
                job_id: Some(app.job_id),
                job_slug: Some(app.job_slug.clone()),
                application_id: Some(app.application_id),
                ..Default::default()
            },
            actions: vec![NotificationAction::link(
                "View application",
                format!("/employer/applications/{}", app.application_id),
            )],
        },
        IntegrationEvent::ApplicationStatusUpdated(update) => NotificationDraft {
            user_id: update.user_id,
            title: "Application status updated".into(),
            message: or_default(&update.message, || {
                format!(
                    "Your application for {} is now {}",
                    update.metadata.job_title,
                    update.status.as_str()
                )
            }),
            kind: application_kind(update.status).into(),
            priority: update.priority,
            metadata: NotificationMetadata {
                job_id: Some(update.job_id),
                job_slug: Some(update.metadata.job_slug.clone()),
                application_id: Some(update.application_id),
                interview_date: update.metadata.interview_date,
                ..Default::default()
            },
            actions: update.actions.clone(),
        },
        IntegrationEvent::JobSaved(saved) => NotificationDraft {
            user_id: saved.user_id,
            title: "Job saved".into(),
            message: or_default(&saved.message, || "Job saved to your list".into()),
            kind: kinds::JOB_SAVED.into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata {
                job_id: Some(saved.job_id),
                job_slug: Some(saved.job_slug.clone()),
                ..Default::default()
            },
            actions: vec![NotificationAction::link(
                "View job",
                format!("/jobs/{}", saved.job_slug),
            )],
        },
        IntegrationEvent::CompanyVerified(company) => NotificationDraft {
            user_id: company.user_id,
            title: "Company verified".into(),
            message: or_default(&company.message, || {
                format!("{} has been verified", company.name)
            }),
            kind: kinds::COMPANY_VERIFIED.into(),
            priority: Priority::High,
            metadata: NotificationMetadata {
                company_id: Some(company.company_id),
                ..Default::default()
            },
            actions: vec![
                NotificationAction::link(
                    "View company",
                    format!("/companies/{}", company.company_id),
                ),
                NotificationAction::link("Post a job", "/post-job"),
            ],
        },
        IntegrationEvent::SubscriptionUpdated(sub) => NotificationDraft {
            user_id: sub.user_id,
            title: "Subscription updated".into(),
            message: or_default(&sub.message, || "Your subscription has been updated".into()),
            kind: kinds::SUBSCRIPTION_UPDATED.into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata {
                company_id: Some(sub.company_id),
                ..Default::default()
            },
            actions: Vec::new(),
        },
        IntegrationEvent::UserInvited(invite) => NotificationDraft {
            user_id: invite.user_id,
            title: "Company invitation".into(),
            message: or_default(&invite.message, || match &invite.company_name {
                Some(name) => format!("You have been invited to join {name}"),
                None => "You have been invited to join a company".into(),
            }),
            kind: kinds::COMPANY_INVITATION.into(),
            priority: Priority::Medium,
            metadata: NotificationMetadata {
                company_id: Some(invite.company_id),
                ..Default::default()
            },
            actions: vec![
                NotificationAction::api_call(
                    "Join",
                    "PATCH",
                    format!("/company/{}/invite/accept", invite.company_id),
                ),
                NotificationAction::api_call(
                    "Decline",
                    "DELETE",
                    format!("/company/{}/invite/reject", invite.company_id),
                ),
            ],
        },
        _ => return None,
    };
    Some(draft)
}

/// Absolute URL a push notification opens.
pub fn deep_link(frontend_url: &str, notification: &Notification) -> String {
    let base = frontend_url.trim_end_matches('/');
    let meta = &notification.metadata;
    let path = match notification.kind.as_str() {
        kinds::APPLICATION_SUBMITTED => meta
            .application_id
            .map(|id| format!("/employer/applications/{id}")),
        kinds::APPLICATION_ACCEPTED
        | kinds::APPLICATION_REJECTED
        | kinds::APPLICATION_IN_REVIEW
        | kinds::APPLICATION_UPDATED => meta.application_id.map(|id| format!("/applications/{id}")),
        kinds::APPLICATION_INTERVIEW => meta.application_id.map(|id| format!("/interviews/{id}")),
        kinds::JOB_PUBLISHED | kinds::JOB_HOT | kinds::JOB_SAVED => {
            meta.job_slug.as_ref().map(|slug| format!("/jobs/{slug}"))
        }
        kinds::COMPANY_VERIFIED | kinds::SUBSCRIPTION_UPDATED | kinds::COMPANY_INVITATION => {
            meta.company_id.map(|id| format!("/companies/{id}"))
        }
        _ => None,
    };
    format!("{base}{}", path.as_deref().unwrap_or("/notifications"))
}
