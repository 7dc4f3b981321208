use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::post,
};
use chrono::Utc;

use jobmesh_auth::{Actor, Role, ensure_role};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/trending/run", post(run_trending_sweep))
}

/// Run the daily sweep now and report what it changed.
pub async fn run_trending_sweep(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    if let Err(e) = ensure_role(&actor, &[Role::Admin], "run the trending sweep") {
        return errors::json_error(StatusCode::FORBIDDEN, "permission_denied", e.to_string());
    }
    let report = services.trending.run_daily(Utc::now());
    dto::success(StatusCode::OK, report)
}
