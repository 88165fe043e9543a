//! Request body extractors with the API's error shape.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::Response,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::app::errors;

/// `Json<T>` whose rejections use the `{"error","message"}` body.
///
/// Malformed or incomplete JSON is a validation failure (400) rather than
/// axum's plain-text 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "request body rejected");
                Err(json_rejection_to_response(rejection))
            }
        }
    }
}

fn json_rejection_to_response(rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::JsonDataError(e) => {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text())
        }
        JsonRejection::JsonSyntaxError(e) => {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text())
        }
        JsonRejection::MissingJsonContentType(e) => {
            errors::json_error(e.status(), "unsupported_media_type", e.body_text())
        }
        other => errors::json_error(other.status(), "invalid_body", other.body_text()),
    }
}
