//! Endpoint policies as axum extractors.
//!
//! A handler declares its policy by taking [`RequireAuthenticated`] or
//! [`RequireAdmin`]. Both read the security context established by
//! [`crate::middleware::authenticate`] and reject before the handler (and its
//! body extractors) run. Handlers without either extractor are public.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::Response,
};
use tracing::debug;

use bookstore_auth::{authorize, Policy, SecurityContext};

use crate::app::errors;
use crate::context::security_context;

/// Any authenticated caller, with or without a resolved role.
#[derive(Debug, Clone, Copy)]
pub struct RequireAuthenticated(pub SecurityContext);

/// An augmented caller holding the `Admin` role.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub SecurityContext);

fn enforce(parts: &Parts, policy: &Policy) -> Result<SecurityContext, Response> {
    let context = security_context(parts);
    authorize(&context, policy).map_err(|e| {
        debug!(path = %parts.uri.path(), error = %e, "request denied");
        errors::authz_error_to_response(&e)
    })?;
    Ok(context)
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireAuthenticated {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        enforce(parts, &Policy::Authenticated).map(Self)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        enforce(parts, &Policy::ADMIN).map(Self)
    }
}
