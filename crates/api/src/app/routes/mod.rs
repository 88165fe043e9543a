use axum::Router;

pub mod books;
pub mod storage;
pub mod system;
pub mod users;

/// Router for everything under `/api`. Per-endpoint policies are declared by
/// the handlers' extractors (see [`crate::authz`]).
pub fn router() -> Router {
    Router::new()
        .nest("/users", users::router())
        .nest("/books", books::router())
        .nest("/storage", storage::router())
}
