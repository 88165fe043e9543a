use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

use crate::app::services::AppServices;
use crate::app::extract::ApiJson;
use crate::app::{dto, errors};
use crate::authz::RequireAuthenticated;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::CredentialsRequest>,
) -> axum::response::Response {
    match services.accounts.register(&body.username, &body.password).await {
        Ok(identity) => (
            StatusCode::CREATED,
            Json(dto::IdentityResponse::from(&identity)),
        )
            .into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::CredentialsRequest>,
) -> axum::response::Response {
    match services.accounts.login(&body.username, &body.password).await {
        Ok(token) => Json(dto::TokenResponse { token }).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

/// The caller's own identity, as currently stored.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    RequireAuthenticated(context): RequireAuthenticated,
) -> axum::response::Response {
    let Some(subject) = context.subject() else {
        return errors::authz_error_to_response(&bookstore_auth::AuthzError::Unauthenticated);
    };

    match services.identities.by_id(subject).await {
        Ok(Some(identity)) => Json(dto::IdentityResponse::from(&identity)).into_response(),
        Ok(None) => {
            warn!(user_id = %subject, "token subject no longer exists");
            errors::not_found("identity not found")
        }
        Err(e) => errors::store_error_to_response(&e),
    }
}
