use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use jobmesh_auth::Actor;
use jobmesh_core::JobId;
use jobmesh_jobs::JobDraft;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `:key` is a slug for reads, deletes and applications, and a job id for
/// moderation actions.
pub fn router() -> Router {
    Router::new()
        .route("/", post(create_job))
        .route("/:key", get(get_job).delete(delete_job))
        .route("/:key/approve", post(approve_job))
        .route("/:key/reject", post(reject_job))
        .route("/:key/feature", post(feature_job))
        .route("/:key/close", post(close_job))
        .route("/:key/apply", post(apply_to_job))
}

fn parse_job_id(raw: &str) -> Result<JobId, Response> {
    raw.parse().map_err(|_| errors::invalid_id("job"))
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Json(draft): Json<JobDraft>,
) -> Response {
    match services.jobs.create_job(draft, &actor, Utc::now()) {
        Ok(job) => dto::success(StatusCode::CREATED, job),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> Response {
    match services.jobs.get_job(&slug) {
        Ok(job) => dto::success(StatusCode::OK, job),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(slug): Path<String>,
) -> Response {
    match services.jobs.delete(&slug, &actor) {
        Ok(job) => dto::success(StatusCode::OK, serde_json::json!({ "deleted": job.slug() })),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn approve_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let job_id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs.approve(job_id, &actor, Utc::now()) {
        Ok(job) => dto::success(StatusCode::OK, job),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reject_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectJobRequest>,
) -> Response {
    let job_id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs.reject(job_id, body.reason, &actor, Utc::now()) {
        Ok(job) => dto::success(StatusCode::OK, job),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn feature_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let job_id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs.mark_featured(job_id, &actor, Utc::now()) {
        Ok(job) => dto::success(StatusCode::OK, job),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn close_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let job_id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs.close(job_id, &actor, Utc::now()) {
        Ok(job) => dto::success(StatusCode::OK, job),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn apply_to_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(slug): Path<String>,
    Json(body): Json<dto::ApplyRequest>,
) -> Response {
    match services
        .applications
        .apply(&slug, &body.resume_url, body.cover_letter, &actor, Utc::now())
    {
        Ok(application) => dto::success(StatusCode::CREATED, application),
        Err(e) => errors::service_error_to_response(e),
    }
}
