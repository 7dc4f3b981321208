use axum::{http::StatusCode, middleware::Next, response::Response};

use crate::app::errors;
use crate::context::actor_from_headers;

/// Reject requests without a usable identity assertion; otherwise attach the
/// [`jobmesh_auth::Actor`] as a request extension.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match actor_from_headers(req.headers()) {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(reason) => errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", reason),
    }
}
