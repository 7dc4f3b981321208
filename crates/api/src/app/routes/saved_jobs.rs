use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use jobmesh_auth::Actor;
use jobmesh_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_saved))
        .route("/:job_id", post(toggle_saved))
}

pub async fn list_saved(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    match services.saved_jobs.list(&actor) {
        Ok(saved) => dto::success(StatusCode::OK, saved),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Saves the job, or unsaves it when already saved.
pub async fn toggle_saved(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(job_id): Path<String>,
) -> Response {
    let Ok(job_id) = job_id.parse::<JobId>() else {
        return errors::invalid_id("job");
    };
    match services.saved_jobs.toggle(job_id, &actor, Utc::now()) {
        Ok(saved) => dto::success(StatusCode::OK, serde_json::json!({ "saved": saved })),
        Err(e) => errors::service_error_to_response(e),
    }
}
