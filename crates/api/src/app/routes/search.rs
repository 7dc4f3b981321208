use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use jobmesh_infra::search::SearchQuery;

use crate::app::services::AppServices;

/// Ranked search over the read model. No matches is still a 200.
pub async fn search(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let page = services.search.search(&query);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "data": page.results,
            "pagination": page.pagination,
            "stats": page.stats,
        })),
    )
        .into_response()
}
