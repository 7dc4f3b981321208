//! Keeps the search index in step with job integration events.

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use jobmesh_events::{DecodeError, EventEnvelope, EventHandler, HandlerError, IntegrationEvent};

use super::index::{FlagPatch, SearchDocument, SearchIndex};

/// What applying one event did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    Upserted,
    Removed,
    Patched,
    /// A flag patch for a slug the index does not hold (yet).
    MissingSlug,
    Ignored,
}

pub struct SearchProjection<I> {
    index: I,
}

impl<I: SearchIndex> SearchProjection<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Apply one event. Every branch is idempotent: upsert by slug, remove by
    /// slug, or overwrite a single flag.
    pub fn apply(&self, event: &IntegrationEvent) -> ProjectionOutcome {
        match event {
            IntegrationEvent::JobPublished(snapshot) => {
                self.index.upsert(SearchDocument::from(snapshot.clone()));
                debug!(slug = %snapshot.slug, "search document upserted");
                ProjectionOutcome::Upserted
            }
            IntegrationEvent::JobDeleted(e) => self.remove(&e.slug),
            // Closed, archived and expired jobs leave search.
            IntegrationEvent::JobStatusChanged(e) => self.remove(&e.slug),
            IntegrationEvent::JobFeatured(e) => self.patch(
                &e.slug,
                event.routing_key(),
                FlagPatch::Featured {
                    is_featured: e.is_featured,
                    featured_expiry: e.featured_expiry,
                },
            ),
            IntegrationEvent::JobHot(e) => self.patch(
                &e.slug,
                event.routing_key(),
                FlagPatch::Hot {
                    is_hot: e.is_hot,
                    hot_until: e.hot_until,
                },
            ),
            _ => ProjectionOutcome::Ignored,
        }
    }

    /// Clear the index and replay `envelopes` in occurrence order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<usize, DecodeError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| e.occurred_at());

        let events = envs
            .iter()
            .map(|env| IntegrationEvent::from_envelope(env).map(EventEnvelope::into_payload))
            .collect::<Result<Vec<_>, _>>()?;

        self.index.clear();
        for event in &events {
            self.apply(event);
        }
        info!(events = events.len(), "search index rebuilt");
        Ok(events.len())
    }

    fn remove(&self, slug: &str) -> ProjectionOutcome {
        if self.index.remove(slug) {
            debug!(slug, "search document removed");
        }
        ProjectionOutcome::Removed
    }

    fn patch(&self, slug: &str, routing_key: &str, patch: FlagPatch) -> ProjectionOutcome {
        if self.index.patch(slug, &patch) {
            debug!(slug, routing_key, "search document patched");
            ProjectionOutcome::Patched
        } else {
            warn!(slug, routing_key, "flag patch for unknown slug ignored");
            ProjectionOutcome::MissingSlug
        }
    }
}

impl<I: SearchIndex> EventHandler for SearchProjection<I> {
    fn name(&self) -> &'static str {
        "search.projection"
    }

    fn bindings(&self) -> Vec<&'static str> {
        vec!["job.#"]
    }

    fn handle(&self, envelope: &EventEnvelope<IntegrationEvent>) -> Result<(), HandlerError> {
        self.apply(envelope.payload());
        Ok(())
    }
}
