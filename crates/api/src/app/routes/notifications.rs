use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, patch, post},
};
use chrono::Utc;

use jobmesh_auth::Actor;
use jobmesh_core::NotificationId;
use jobmesh_infra::notifications::TokenRegistration;
use jobmesh_infra::pagination::PageRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", patch(mark_all_read))
        .route("/tokens", post(register_token))
        .route("/:id/read", patch(mark_read))
}

pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<dto::NotificationListQuery>,
) -> Response {
    let page = PageRequest::new(query.page, query.limit);
    match services.inbox.list(&actor, query.unread_only, page) {
        Ok((items, pagination)) => dto::paged(items, pagination),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn unread_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    match services.inbox.unread_count(&actor) {
        Ok(count) => dto::success(StatusCode::OK, serde_json::json!({ "count": count })),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<NotificationId>() else {
        return errors::invalid_id("notification");
    };
    match services.inbox.mark_read(id, &actor) {
        Ok(notification) => dto::success(StatusCode::OK, notification),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn mark_all_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    match services.inbox.mark_all_read(&actor) {
        Ok(updated) => dto::success(StatusCode::OK, serde_json::json!({ "updated": updated })),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn register_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
    Json(registration): Json<TokenRegistration>,
) -> Response {
    match services.inbox.register_token(&actor, registration, Utc::now()) {
        Ok(token) => dto::success(
            StatusCode::OK,
            serde_json::json!({ "platform": token.platform, "active": token.is_active }),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}
