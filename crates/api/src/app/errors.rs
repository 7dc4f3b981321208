use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use jobmesh_core::DomainError;
use jobmesh_infra::ServiceError;

pub fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::PermissionDenied(_) | DomainError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) | DomainError::InvariantViolation(_) => StatusCode::CONFLICT,
        DomainError::QuotaUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Domain rejections are surfaced verbatim; infrastructure failures are logged
/// and answered with a generic message.
pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(e) => json_error(domain_status(&e), e.code(), e.to_string()),
        ServiceError::DependencyUnavailable(detail) => {
            error!(error = %detail, "dependency unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "dependency_unavailable",
                "a required service is temporarily unavailable",
            )
        }
        ServiceError::Publish(detail) => {
            error!(error = %detail, "event publication failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "the request could not be completed",
            )
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}
