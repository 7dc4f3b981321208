use axum::{Router, routing::get};

pub mod admin;
pub mod applications;
pub mod jobs;
pub mod notifications;
pub mod saved_jobs;
pub mod search;
pub mod system;

/// Router for all endpoints that require an asserted identity.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/search", get(search::search))
        .nest("/jobs", jobs::router())
        .nest("/applications", applications::router())
        .nest("/saved-jobs", saved_jobs::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
}
