use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Value, json};

use jobmesh_api::app::{self, AppServices, services::build_in_memory};
use jobmesh_core::{CompanyId, UserId};
use jobmesh_events::IntegrationEvent;
use jobmesh_events::integration::{CompanyCreated, SubscriptionSnapshot};
use jobmesh_infra::AppConfig;

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as the binary, bound to an ephemeral port.
        let services = Arc::new(build_in_memory(AppConfig::default()).expect("start workers"));
        let app = app::build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn announce_company(&self, company: CompanyId, job_post_limit: u32) {
        let event = IntegrationEvent::CompanyCreated(CompanyCreated {
            company_id: company,
            user_id: UserId::new(),
            subscription: SubscriptionSnapshot {
                plan: Default::default(),
                billing_cycle: Default::default(),
                start_date: None,
                end_date: Some(Utc::now() + chrono::Duration::days(30)),
                job_post_limit,
                featured_jobs_limit: 0,
            },
        });
        self.services.publisher().publish_event(&event).unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.services.shutdown();
    }
}

struct Identity {
    user_id: UserId,
    role: &'static str,
    company: Option<CompanyId>,
}

impl Identity {
    fn new(role: &'static str) -> Self {
        Self {
            user_id: UserId::new(),
            role,
            company: None,
        }
    }

    fn of(mut self, company: CompanyId) -> Self {
        self.company = Some(company);
        self
    }

    fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req
            .header("x-user-id", self.user_id.to_string())
            .header("x-user-role", self.role);
        match self.company {
            Some(company) => req.header("x-company-id", company.to_string()),
            None => req,
        }
    }
}

fn job_body(company: CompanyId, title: &str) -> Value {
    json!({
        "title": title,
        "description": "Design and operate event-driven services",
        "company": company.to_string(),
        "companyName": "Acme",
        "location": "Remote",
        "salary": 120000,
        "experience": "3+ years",
        "skills": ["rust", "redis"],
        "benefits": ["remote", "health insurance"],
        "jobType": "Full-time",
        "category": "engineering",
        "applicationDeadline": (Utc::now() + chrono::Duration::days(30)).to_rfc3339(),
    })
}

/// Retry `check` until it returns `Some` or five seconds pass.
async fn eventually<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    for _ in 0..100 {
        if let Some(value) = check().await {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn create_job(
    client: &reqwest::Client,
    server: &TestServer,
    poster: &Identity,
    company: CompanyId,
    title: &str,
) -> reqwest::Response {
    poster
        .apply(client.post(server.url("/jobs")))
        .json(&job_body(company, title))
        .send()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_public_and_everything_else_needs_identity() {
    let server = &TestServer::spawn().await;
    let client = &reqwest::Client::new();

    let resp = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(server.url("/search")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test(flavor = "multi_thread")]
async fn posting_without_a_cached_subscription_is_unavailable() {
    let server = &TestServer::spawn().await;
    let client = &reqwest::Client::new();
    let company = CompanyId::new();
    let poster = &Identity::new("recruiter").of(company);

    let resp = create_job(client, server, poster, company, "Platform Engineer").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "quota_unavailable");
}

#[tokio::test(flavor = "multi_thread")]
async fn approved_job_becomes_searchable_and_accepts_one_application_per_user() {
    let server = &TestServer::spawn().await;
    let client = &reqwest::Client::new();
    let company = CompanyId::new();
    server.announce_company(company, 5);

    let poster = &Identity::new("recruiter").of(company);
    let created: Value = eventually("subscription cached", || async move {
        let resp = create_job(client, server, poster, company, "Senior Rust Engineer").await;
        if resp.status() == StatusCode::CREATED {
            resp.json::<Value>().await.ok()
        } else {
            None
        }
    })
    .await;
    let job_id = created["data"]["id"].as_str().unwrap().to_string();
    let slug = created["data"]["slug"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["status"], "Pending");

    // Only platform admins moderate.
    let resp = poster
        .apply(client.post(server.url(&format!("/jobs/{job_id}/approve"))))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let admin = Identity::new("admin");
    let resp = admin
        .apply(client.post(server.url(&format!("/jobs/{job_id}/approve"))))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let applicant = &Identity::new("applicant");
    let hits: Value = eventually("job indexed", || async move {
        let body: Value = applicant
            .apply(client.get(server.url("/search?query=rust")))
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;
        (body["data"].as_array()?.len() == 1).then_some(body)
    })
    .await;
    assert_eq!(hits["data"][0]["slug"], slug.as_str());
    assert_eq!(hits["data"][0]["tier"], "normal");

    let apply = json!({ "resumeUrl": "https://cv.example.com/me.pdf" });
    let resp = applicant
        .apply(client.post(server.url(&format!("/jobs/{slug}/apply"))))
        .json(&apply)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = applicant
        .apply(client.post(server.url(&format!("/jobs/{slug}/apply"))))
        .json(&apply)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test(flavor = "multi_thread")]
async fn poster_is_notified_when_the_job_is_published() {
    let server = &TestServer::spawn().await;
    let client = &reqwest::Client::new();
    let company = CompanyId::new();
    server.announce_company(company, 5);

    let poster = &Identity::new("recruiter").of(company);
    let created: Value = eventually("subscription cached", || async move {
        let resp = create_job(client, server, poster, company, "Data Engineer").await;
        if resp.status() == StatusCode::CREATED {
            resp.json::<Value>().await.ok()
        } else {
            None
        }
    })
    .await;
    let job_id = created["data"]["id"].as_str().unwrap().to_string();
    Identity::new("admin")
        .apply(client.post(server.url(&format!("/jobs/{job_id}/approve"))))
        .send()
        .await
        .unwrap();

    let list: Value = eventually("publish notification", || async move {
        let body: Value = poster
            .apply(client.get(server.url("/notifications?unreadOnly=true")))
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;
        (body["pagination"]["total"] == 1).then_some(body)
    })
    .await;
    let notification = &list["data"][0];
    assert_eq!(notification["type"], "job_published");
    // No device registered, so push is recorded as failed.
    assert_eq!(notification["deliveryStatus"]["push"], "failed");

    let id = notification["id"].as_str().unwrap();
    let resp = poster
        .apply(client.patch(server.url(&format!("/notifications/{id}/read"))))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = poster
        .apply(client.patch(server.url("/notifications/not-an-id/read")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn trending_sweep_is_admin_only() {
    let server = &TestServer::spawn().await;
    let client = &reqwest::Client::new();

    let resp = Identity::new("recruiter")
        .apply(client.post(server.url("/admin/trending/run")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = Identity::new("admin")
        .apply(client.post(server.url("/admin/trending/run")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["promoted"], 0);
}
