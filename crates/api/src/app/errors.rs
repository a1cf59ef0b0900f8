use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use dunning_core::DomainError;
use dunning_infra::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::External(e) => {
            tracing::warn!(service = e.service, error = %e.message, "collaborator failure");
            json_error(StatusCode::BAD_GATEWAY, "external_failure", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(errors) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "validation_error",
                "message": "validation failed",
                "errors": errors,
            })),
        )
            .into_response(),
        DomainError::InvalidDate(input) => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_date",
            format!("could not read date: {input}"),
        ),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::GuardViolation(msg) => {
            json_error(StatusCode::CONFLICT, "guard_violation", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
