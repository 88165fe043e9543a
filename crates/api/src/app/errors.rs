//! Mapping of domain and infrastructure errors to HTTP responses.
//!
//! Every error body has the shape `{"error": <code>, "message": <text>}`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use bookstore_auth::{AccountError, AuthzError, StoreError};
use bookstore_books::{BookStoreError, FileStorageError};
use bookstore_core::DomainError;

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    match err {
        AccountError::InvalidCredential => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        ),
        AccountError::DuplicateUsername => json_error(
            StatusCode::BAD_REQUEST,
            "duplicate_username",
            "username already exists",
        ),
        AccountError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AccountError::Store(e) => store_error_to_response(&e),
        other => {
            error!(error = %other, "account operation failed");
            internal_error()
        }
    }
}

pub fn authz_error_to_response(err: &AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Unauthenticated => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "a valid bearer token is required",
        ),
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

pub fn store_error_to_response(err: &StoreError) -> axum::response::Response {
    match err {
        StoreError::Unavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            "identity store unavailable",
        ),
        StoreError::ConstraintViolation(_) => {
            error!(error = %err, "unexpected constraint violation");
            internal_error()
        }
    }
}

pub fn book_store_error_to_response(err: &BookStoreError) -> axum::response::Response {
    match err {
        BookStoreError::Unavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            "book store unavailable",
        ),
    }
}

pub fn file_storage_error_to_response(err: &FileStorageError) -> axum::response::Response {
    match err {
        FileStorageError::InvalidName(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_file_name", err.to_string())
        }
        FileStorageError::Io(_) => {
            error!(error = %err, "file storage failed");
            internal_error()
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => not_found("not found"),
    }
}

pub fn not_found(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
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
