use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use bookstore_auth::{ClaimsAugmentation, SecurityContext, TokenService};

use crate::app::errors;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
    pub augmentation: Arc<ClaimsAugmentation>,
}

/// Establish the request's [`SecurityContext`].
///
/// Runs for every request. A missing, malformed, or invalid bearer token
/// leaves the request anonymous; policy extractors decide whether that is
/// acceptable. A valid token is then augmented with the subject's current
/// role. An identity store failure during augmentation aborts the request.
pub async fn authenticate(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let context = match extract_bearer(req.headers()) {
        Ok(None) => SecurityContext::Anonymous,
        Ok(Some(token)) => match state.tokens.validate(token) {
            Ok(subject) => SecurityContext::authenticated(subject),
            Err(e) => {
                debug!(error = %e, "bearer token rejected");
                SecurityContext::Anonymous
            }
        },
        Err(reason) => {
            debug!(reason, "malformed authorization header");
            SecurityContext::Anonymous
        }
    };

    let context = match state.augmentation.augment(context).await {
        Ok(context) => context,
        Err(e) => {
            error!(error = %e, "claims augmentation failed");
            return errors::store_error_to_response(&e);
        }
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}

/// `Ok(None)` when no `Authorization` header is present.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| "non-ascii header")?;

    let (scheme, token) = header.split_once(' ').ok_or("missing scheme")?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err("unsupported scheme");
    }

    let token = token.trim();
    if token.is_empty() {
        return Err("empty token");
    }

    Ok(Some(token))
}
