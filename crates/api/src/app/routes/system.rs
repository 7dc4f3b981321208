use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use jobmesh_auth::Actor;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(actor): Extension<Actor>) -> impl IntoResponse {
    Json(serde_json::json!({
        "userId": actor.user_id().to_string(),
        "role": actor.role().to_string(),
        "companyId": actor.company_id().map(|c| c.to_string()),
    }))
}
