use axum::http::request::Parts;

use bookstore_auth::SecurityContext;

/// Security context attached to the request by the authentication
/// middleware.
///
/// A request that never went through the middleware is treated as
/// anonymous.
pub fn security_context(parts: &Parts) -> SecurityContext {
    parts
        .extensions
        .get::<SecurityContext>()
        .copied()
        .unwrap_or_default()
}
