//! Search read model: projection from job events plus tiered ranking.

pub mod index;
pub mod projection;
pub mod ranking;

pub use index::{FlagPatch, InMemorySearchIndex, SearchDocument, SearchIndex};
pub use projection::{ProjectionOutcome, SearchProjection};
pub use ranking::{
    INTERLEAVE_PATTERN, RankedResult, SearchPage, SearchQuery, SearchStats, SortBy, SortOrder, Tier,
    interleave, rank,
};

/// Query side over a [`SearchIndex`].
pub struct SearchService<I> {
    index: I,
}

impl<I: SearchIndex> SearchService<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn search(&self, query: &SearchQuery) -> SearchPage {
        rank(self.index.all(), query)
    }

    pub fn get(&self, slug: &str) -> Option<SearchDocument> {
        self.index.get(slug)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};

    use jobmesh_core::{CompanyId, JobId, UserId};
    use jobmesh_events::integration::{JobSnapshot, JobStatus, JobType};

    /// A published snapshot created `age_minutes` ago.
    pub fn snapshot(slug: &str, salary: u64, age_minutes: i64) -> JobSnapshot {
        let now = Utc::now();
        JobSnapshot {
            job_id: JobId::new(),
            slug: slug.to_string(),
            title: format!("Job {slug}"),
            description: "Ship things".into(),
            company: CompanyId::new(),
            company_name: "Acme".into(),
            location: "Remote".into(),
            salary,
            experience: None,
            skills: vec![],
            job_type: JobType::FullTime,
            benefits: vec![],
            category: Some("engineering".into()),
            status: JobStatus::Published,
            is_featured: false,
            featured_expiry: None,
            is_hot: false,
            hot_until: None,
            application_deadline: now + Duration::days(30),
            posted_by: UserId::new(),
            created_at: now - Duration::minutes(age_minutes),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn service_reads_through_the_index() {
        let index = Arc::new(InMemorySearchIndex::new());
        index.upsert(SearchDocument::from(testing::snapshot("go-developer", 80_000, 1)));
        let service = SearchService::new(index);

        let page = service.search(&SearchQuery::default());
        assert_eq!(page.results.len(), 1);
        assert!(service.get("go-developer").is_some());
    }
}
