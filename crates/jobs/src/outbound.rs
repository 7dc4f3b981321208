//! Translation from state-machine events to the integration events other
//! components consume.

use jobmesh_events::integration::{self as integration, IntegrationEvent};

use crate::job::{Job, JobEvent};

/// Integration events for a batch of just-applied job events.
///
/// `job` must be the aggregate state after applying `events`. `Created` and
/// `Rejected` produce nothing: pending and rejected jobs are never projected.
pub fn integration_events(job: &Job, events: &[JobEvent]) -> Vec<IntegrationEvent> {
    events
        .iter()
        .filter_map(|event| integration_event(job, event))
        .collect()
}

fn integration_event(job: &Job, event: &JobEvent) -> Option<IntegrationEvent> {
    match event {
        JobEvent::Created(_) | JobEvent::Rejected(_) => None,
        JobEvent::Published(_) => Some(IntegrationEvent::JobPublished(job.to_snapshot(Some(
            format!("Your job \"{}\" has been approved and published", job.title()),
        )))),
        JobEvent::Featured(e) => Some(featured(job, true, e.expires_at)),
        JobEvent::FeaturedExpired(_) => Some(featured(job, false, None)),
        JobEvent::MarkedHot(e) => Some(hot(job, true, Some(e.hot_until))),
        JobEvent::HotExpired(_) => Some(hot(job, false, None)),
        JobEvent::Closed(_) | JobEvent::Archived(_) | JobEvent::Expired(_) => Some(
            IntegrationEvent::JobStatusChanged(integration::JobStatusChanged {
                job_id: job.id_typed(),
                slug: job.slug().to_string(),
                status: job.status(),
            }),
        ),
    }
}

fn featured(
    job: &Job,
    is_featured: bool,
    featured_expiry: Option<chrono::DateTime<chrono::Utc>>,
) -> IntegrationEvent {
    IntegrationEvent::JobFeatured(integration::JobFeatured {
        job_id: job.id_typed(),
        slug: job.slug().to_string(),
        is_featured,
        featured_expiry,
    })
}

fn hot(job: &Job, is_hot: bool, hot_until: Option<chrono::DateTime<chrono::Utc>>) -> IntegrationEvent {
    IntegrationEvent::JobHot(integration::JobHot {
        job_id: job.id_typed(),
        slug: job.slug().to_string(),
        is_hot,
        hot_until,
        title: job.title().to_string(),
        posted_by: job.posted_by(),
    })
}

/// `job.deleted`, built from the last state before removal.
pub fn deleted_event(job: &Job) -> IntegrationEvent {
    IntegrationEvent::JobDeleted(integration::JobDeleted {
        job_id: job.id_typed(),
        slug: job.slug().to_string(),
        company: job.company(),
        status: job.status(),
    })
}
