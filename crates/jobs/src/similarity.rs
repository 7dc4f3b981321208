//! "Similar jobs" scoring.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::job::Job;

pub const DEFAULT_SIMILAR_LIMIT: usize = 3;

const SAME_CATEGORY: u32 = 50;
const SAME_COMPANY: u32 = 30;
const PER_SHARED_SKILL: u32 = 4;
const SAME_LOCATION: u32 = 10;
const SAME_JOB_TYPE: u32 = 5;
const SALARY_BAND: u32 = 5;

fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Salary within ±20% of the reference.
fn in_salary_band(reference: u64, candidate: u64) -> bool {
    let (reference, candidate) = (u128::from(reference), u128::from(candidate));
    candidate * 10 >= reference * 8 && candidate * 10 <= reference * 12
}

pub fn similarity_score(reference: &Job, candidate: &Job) -> u32 {
    let (r, c) = (reference.details(), candidate.details());
    let mut score = 0;

    if let (Some(a), Some(b)) = (&r.category, &c.category) {
        if same_text(a, b) {
            score += SAME_CATEGORY;
        }
    }
    if r.company == c.company {
        score += SAME_COMPANY;
    }

    let skills: HashSet<String> = r.skills.iter().map(|s| s.to_lowercase()).collect();
    let shared = c
        .skills
        .iter()
        .map(|s| s.to_lowercase())
        .collect::<HashSet<_>>()
        .intersection(&skills)
        .count() as u32;
    score += shared * PER_SHARED_SKILL;

    if same_text(&r.location, &c.location) {
        score += SAME_LOCATION;
    }
    if r.job_type == c.job_type {
        score += SAME_JOB_TYPE;
    }
    if in_salary_band(r.salary, c.salary) {
        score += SALARY_BAND;
    }
    score
}

/// Published, still-open jobs other than `reference`, best match first.
///
/// Ties fall back to the most recent posting.
pub fn rank_similar<'a>(
    reference: &Job,
    candidates: impl IntoIterator<Item = &'a Job>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<(&'a Job, u32)> {
    let mut scored: Vec<(&Job, u32)> = candidates
        .into_iter()
        .filter(|job| job.id_typed() != reference.id_typed())
        .filter(|job| job.accepts_applications(now))
        .map(|job| (job, similarity_score(reference, job)))
        .filter(|(_, score)| *score > 0)
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.cmp(sa)
            .then_with(|| b.created_at().cmp(&a.created_at()))
            .then_with(|| a.slug().cmp(b.slug()))
    });
    scored.truncate(limit);
    scored
}
