use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use jobmesh_infra::pagination::Pagination;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RejectJobRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub resume_url: String,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -------------------------
// Response helpers
// -------------------------

pub fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, axum::Json(json!({ "success": true, "data": data }))).into_response()
}

pub fn paged<T: Serialize>(items: Vec<T>, pagination: Pagination) -> Response {
    (
        StatusCode::OK,
        axum::Json(json!({
            "success": true,
            "data": items,
            "pagination": pagination,
        })),
    )
        .into_response()
}
