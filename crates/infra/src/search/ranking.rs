//! Filtering, tiering and interleaving of search results.
//!
//! Matching documents are split into featured, hot and normal tiers. Each tier
//! is sorted on its own and the tiers are then woven together with a fixed
//! slot pattern, so promoted listings show up at a bounded rate instead of
//! crowding out everything else.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::index::SearchDocument;
use crate::pagination::{PageRequest, Pagination, paginate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Featured,
    /// Hot but not featured.
    Hot,
    Normal,
}

impl Tier {
    pub fn of(doc: &SearchDocument) -> Tier {
        if doc.is_featured {
            Tier::Featured
        } else if doc.is_hot {
            Tier::Hot
        } else {
            Tier::Normal
        }
    }
}

/// One featured slot, one hot slot, three normal slots, repeated.
pub const INTERLEAVE_PATTERN: [Tier; 5] = [Tier::Featured, Tier::Hot, Tier::Normal, Tier::Normal, Tier::Normal];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Salary,
    CreatedAt,
    /// No relevance score is kept; falls back to recency.
    #[default]
    Score,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Search parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Case-insensitive substring of the title.
    pub query: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub min_salary: Option<u64>,
    pub max_salary: Option<u64>,
    pub experience: Option<String>,
    /// Comma-separated; a document matches if it has any of them.
    pub skills: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub interleave: Option<bool>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SearchQuery {
    pub fn interleaving(&self) -> bool {
        self.interleave.unwrap_or(true)
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    fn skill_list(&self) -> Vec<String> {
        non_empty(&self.skills)
            .map(|s| {
                s.split(',')
                    .map(|skill| skill.trim().to_lowercase())
                    .filter(|skill| !skill.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn matches(&self, doc: &SearchDocument) -> bool {
        let skills = self.skill_list();
        non_empty(&self.query).is_none_or(|q| contains_ci(&doc.title, q))
            && non_empty(&self.location).is_none_or(|l| contains_ci(&doc.location, l))
            && non_empty(&self.job_type).is_none_or(|t| doc.job_type.as_str().eq_ignore_ascii_case(t))
            && self.min_salary.is_none_or(|min| doc.salary >= min)
            && self.max_salary.is_none_or(|max| doc.salary <= max)
            && non_empty(&self.experience).is_none_or(|wanted| {
                doc.experience
                    .as_deref()
                    .is_some_and(|e| e.trim().eq_ignore_ascii_case(wanted))
            })
            && (skills.is_empty()
                || doc
                    .skills
                    .iter()
                    .any(|s| skills.contains(&s.trim().to_lowercase())))
    }

    /// Order within a tier.
    pub fn compare(&self, a: &SearchDocument, b: &SearchDocument) -> Ordering {
        let directed = |ord: Ordering| match self.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        let primary = match self.sort_by {
            SortBy::Salary => directed(a.salary.cmp(&b.salary))
                .then_with(|| b.created_at.cmp(&a.created_at)),
            SortBy::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
            SortBy::Score => b.created_at.cmp(&a.created_at),
        };
        primary.then_with(|| a.slug.cmp(&b.slug))
    }
}

/// Weave the tiers together following [`INTERLEAVE_PATTERN`].
///
/// A slot whose tier is exhausted is skipped, never back-filled from another
/// tier, so the relative order inside each tier is preserved.
pub fn interleave<T>(featured: Vec<T>, hot: Vec<T>, normal: Vec<T>, limit: usize) -> Vec<T> {
    let mut featured = featured.into_iter().peekable();
    let mut hot = hot.into_iter().peekable();
    let mut normal = normal.into_iter().peekable();
    let mut out = Vec::new();

    for tier in INTERLEAVE_PATTERN.iter().cycle() {
        if out.len() >= limit
            || (featured.peek().is_none() && hot.peek().is_none() && normal.peek().is_none())
        {
            break;
        }
        let next = match tier {
            Tier::Featured => featured.next(),
            Tier::Hot => hot.next(),
            Tier::Normal => normal.next(),
        };
        out.extend(next);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    #[serde(flatten)]
    pub document: SearchDocument,
    pub tier: Tier,
}

/// Tier counts on the returned page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub featured: usize,
    pub hot: usize,
    pub normal: usize,
    pub interleaving_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub results: Vec<RankedResult>,
    pub pagination: Pagination,
    pub stats: SearchStats,
}

/// Filter, order and paginate `documents`.
///
/// With interleaving, the total is the length of the whole interleaved
/// sequence; pages are cut from that sequence.
pub fn rank(documents: Vec<SearchDocument>, query: &SearchQuery) -> SearchPage {
    let mut matching: Vec<SearchDocument> = documents.into_iter().filter(|d| query.matches(d)).collect();
    let interleaving = query.interleaving();

    let ordered = if interleaving {
        let (mut featured, mut hot, mut normal) = (Vec::new(), Vec::new(), Vec::new());
        for doc in matching {
            match Tier::of(&doc) {
                Tier::Featured => featured.push(doc),
                Tier::Hot => hot.push(doc),
                Tier::Normal => normal.push(doc),
            }
        }
        for tier in [&mut featured, &mut hot, &mut normal] {
            tier.sort_by(|a, b| query.compare(a, b));
        }
        let total = featured.len() + hot.len() + normal.len();
        interleave(featured, hot, normal, total)
    } else {
        matching.sort_by(|a, b| {
            b.is_featured
                .cmp(&a.is_featured)
                .then_with(|| b.is_hot.cmp(&a.is_hot))
                .then_with(|| query.compare(a, b))
        });
        matching
    };

    let (page, pagination) = paginate(ordered, query.page_request());
    let mut stats = SearchStats {
        interleaving_enabled: interleaving,
        ..SearchStats::default()
    };
    let results = page
        .into_iter()
        .map(|document| {
            let tier = Tier::of(&document);
            match tier {
                Tier::Featured => stats.featured += 1,
                Tier::Hot => stats.hot += 1,
                Tier::Normal => stats.normal += 1,
            }
            RankedResult { document, tier }
        })
        .collect();

    SearchPage {
        results,
        pagination,
        stats,
    }
}
