use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, patch},
};
use chrono::Utc;

use jobmesh_auth::Actor;
use jobmesh_core::ApplicationId;
use jobmesh_infra::services::StatusUpdate;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/mine", get(my_applications))
        .route("/:id/status", patch(update_status))
}

pub async fn my_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    match services.applications.list_my_applications(&actor) {
        Ok(list) => dto::success(StatusCode::OK, list),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Response {
    let Ok(application_id) = id.parse::<ApplicationId>() else {
        return errors::invalid_id("application");
    };
    match services
        .applications
        .update_status(application_id, update, &actor, Utc::now())
    {
        Ok(application) => dto::success(StatusCode::OK, application),
        Err(e) => errors::service_error_to_response(e),
    }
}
