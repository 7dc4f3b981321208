use chrono::{DateTime, Utc};
use serde::Deserialize;

use jobmesh_core::{CompanyId, DomainError, DomainResult};
use jobmesh_events::integration::JobType;

use crate::job::JobDetails;

/// Job creation payload as submitted by a poster.
///
/// Every field is optional at the wire level so that `validate` can report the
/// first violated constraint with a readable message instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub company: Option<CompanyId>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub salary: Option<i64>,
    pub experience: Option<String>,
    pub skills: Option<Vec<String>>,
    pub job_type: Option<String>,
    pub benefits: Option<Vec<String>>,
    pub category: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
}

fn required<T>(value: Option<T>, field: &str) -> DomainResult<T> {
    value.ok_or_else(|| DomainError::validation(format!("\"{field}\" is required")))
}

fn required_text(value: Option<String>, field: &str, min_len: usize) -> DomainResult<String> {
    let value = required(value, field)?.trim().to_string();
    if value.is_empty() {
        return Err(DomainError::validation(format!(
            "\"{field}\" is not allowed to be empty"
        )));
    }
    if value.chars().count() < min_len {
        return Err(DomainError::validation(format!(
            "\"{field}\" length must be at least {min_len} characters long"
        )));
    }
    Ok(value)
}

impl JobDraft {
    /// Check the payload and convert it into admission-ready details.
    ///
    /// Returns the details plus whether the poster asked for a featured slot.
    pub fn validate(self, now: DateTime<Utc>) -> DomainResult<(JobDetails, bool)> {
        let title = required_text(self.title, "title", 5)?;
        let description = required_text(self.description, "description", 10)?;
        let company = required(self.company, "company")?;
        let company_name = required_text(self.company_name, "companyName", 1)?;
        let location = required_text(self.location, "location", 1)?;

        let salary = required(self.salary, "salary")?;
        let salary = u64::try_from(salary).map_err(|_| {
            DomainError::validation("\"salary\" must be greater than or equal to 0")
        })?;

        let skills = required(self.skills, "skills")?;
        let job_type = required(self.job_type, "jobType")?;
        let job_type = JobType::parse(&job_type).ok_or_else(|| {
            DomainError::validation(
                "\"jobType\" must be one of [Full-time, Part-time, Contract, Freelance, Internship, Remote]",
            )
        })?;
        let benefits = required(self.benefits, "benefits")?;

        let application_deadline = required(self.application_deadline, "applicationDeadline")?;
        if application_deadline <= now {
            return Err(DomainError::validation(
                "\"applicationDeadline\" must be in the future",
            ));
        }

        let details = JobDetails {
            title,
            description,
            company,
            company_name,
            location,
            salary,
            experience: self
                .experience
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            skills: normalize_list(skills),
            job_type,
            benefits: normalize_list(benefits),
            category: self
                .category
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            application_deadline,
        };
        Ok((details, self.is_featured))
    }
}

fn normalize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(now: DateTime<Utc>) -> JobDraft {
        JobDraft {
            title: Some("Backend Engineer".to_string()),
            description: Some("Own the event pipeline end to end".to_string()),
            company: Some(CompanyId::new()),
            company_name: Some("Acme".to_string()),
            location: Some("Ha Noi".to_string()),
            salary: Some(2_000),
            experience: Some(" 3 years ".to_string()),
            skills: Some(vec!["Rust".to_string(), " ".to_string()]),
            job_type: Some("full-time".to_string()),
            benefits: Some(vec![]),
            category: Some(" Engineering ".to_string()),
            application_deadline: Some(now + Duration::days(14)),
            is_featured: true,
        }
    }

    fn message(err: DomainError) -> String {
        match err {
            DomainError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_draft_is_normalized() {
        let now = Utc::now();
        let (details, featured) = draft(now).validate(now).unwrap();
        assert!(featured);
        assert_eq!(details.job_type, JobType::FullTime);
        assert_eq!(details.skills, vec!["Rust".to_string()]);
        assert_eq!(details.category.as_deref(), Some("engineering"));
        assert_eq!(details.experience.as_deref(), Some("3 years"));
    }

    #[test]
    fn first_violation_is_reported() {
        let now = Utc::now();
        let mut d = draft(now);
        d.title = Some("Dev".to_string());
        d.salary = Some(-1);
        assert_eq!(
            message(d.validate(now).unwrap_err()),
            "\"title\" length must be at least 5 characters long"
        );
    }

    #[test]
    fn negative_salary_is_rejected() {
        let now = Utc::now();
        let mut d = draft(now);
        d.salary = Some(-5);
        assert!(message(d.validate(now).unwrap_err()).contains("salary"));
    }

    #[test]
    fn missing_skills_is_rejected() {
        let now = Utc::now();
        let mut d = draft(now);
        d.skills = None;
        assert_eq!(message(d.validate(now).unwrap_err()), "\"skills\" is required");
    }

    #[test]
    fn unknown_job_type_is_rejected() {
        let now = Utc::now();
        let mut d = draft(now);
        d.job_type = Some("Gig".to_string());
        assert!(message(d.validate(now).unwrap_err()).starts_with("\"jobType\" must be one of"));
    }

    #[test]
    fn past_deadline_is_rejected() {
        let now = Utc::now();
        let mut d = draft(now);
        d.application_deadline = Some(now - Duration::hours(1));
        assert!(message(d.validate(now).unwrap_err()).contains("applicationDeadline"));
    }

    #[test]
    fn draft_deserializes_from_camel_case() {
        let json = serde_json::json!({
            "title": "Data Engineer",
            "companyName": "Acme",
            "jobType": "Remote",
            "applicationDeadline": "2030-01-01T00:00:00Z",
            "isFeatured": true
        });
        let d: JobDraft = serde_json::from_value(json).unwrap();
        assert_eq!(d.company_name.as_deref(), Some("Acme"));
        assert!(d.is_featured);
        assert!(d.description.is_none());
    }
}
