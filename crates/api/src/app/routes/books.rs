use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use bookstore_books::{Book, BookInput};
use bookstore_core::BookId;

use crate::app::errors;
use crate::app::extract::ApiJson;
use crate::app::services::AppServices;
use crate::authz::{RequireAdmin, RequireAuthenticated};

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Request body cap for image uploads (image plus multipart framing).
const MAX_UPLOAD_BODY_BYTES: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// Multipart field carrying the image.
const IMAGE_FIELD: &str = "file";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/:id", get(get_book).put(update_book).delete(delete_book))
        .route(
            "/image/:id",
            put(upload_image)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BODY_BYTES)),
        )
}

fn parse_id(raw: &str) -> Result<BookId, axum::response::Response> {
    raw.parse::<BookId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid book id"))
}

pub async fn list_books(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.books.list().await {
        Ok(books) => Json(books).into_response(),
        Err(e) => errors::book_store_error_to_response(&e),
    }
}

pub async fn get_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.books.get(id).await {
        Ok(Some(book)) => Json(book).into_response(),
        Ok(None) => errors::not_found("book not found"),
        Err(e) => errors::book_store_error_to_response(&e),
    }
}

pub async fn create_book(
    Extension(services): Extension<Arc<AppServices>>,
    RequireAuthenticated(_caller): RequireAuthenticated,
    ApiJson(body): ApiJson<BookInput>,
) -> axum::response::Response {
    let book = match Book::create(body, services.clock.now()) {
        Ok(b) => b,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.books.insert(book).await {
        Ok(book) => {
            info!(book_id = %book.id, "book created");
            (StatusCode::CREATED, Json(book)).into_response()
        }
        Err(e) => errors::book_store_error_to_response(&e),
    }
}

pub async fn update_book(
    Extension(services): Extension<Arc<AppServices>>,
    RequireAuthenticated(_caller): RequireAuthenticated,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<BookInput>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut book = match services.books.get(id).await {
        Ok(Some(b)) => b,
        Ok(None) => return errors::not_found("book not found"),
        Err(e) => return errors::book_store_error_to_response(&e),
    };

    if let Err(e) = book.apply(body, services.clock.now()) {
        return errors::domain_error_to_response(e);
    }

    match services.books.update(book).await {
        Ok(Some(book)) => Json(book).into_response(),
        Ok(None) => errors::not_found("book not found"),
        Err(e) => errors::book_store_error_to_response(&e),
    }
}

pub async fn delete_book(
    Extension(services): Extension<Arc<AppServices>>,
    RequireAdmin(_caller): RequireAdmin,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let removed = match services.books.delete(id).await {
        Ok(Some(b)) => b,
        Ok(None) => return errors::not_found("book not found"),
        Err(e) => return errors::book_store_error_to_response(&e),
    };

    if let Some(image) = removed.image.as_deref() {
        // The book is already gone; a leftover file is only logged.
        if let Err(e) = services.files.delete(image).await {
            warn!(book_id = %removed.id, file = %image, error = %e, "failed to delete book image");
        }
    }

    info!(book_id = %removed.id, "book deleted");
    StatusCode::NO_CONTENT.into_response()
}

pub async fn upload_image(
    Extension(services): Extension<Arc<AppServices>>,
    RequireAdmin(_caller): RequireAdmin,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut book = match services.books.get(id).await {
        Ok(Some(b)) => b,
        Ok(None) => return errors::not_found("book not found"),
        Err(e) => return errors::book_store_error_to_response(&e),
    };

    let (original_name, bytes) = loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    "multipart field 'file' is required",
                );
            }
            Err(e) => return errors::json_error(e.status(), "invalid_multipart", e.body_text()),
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => break (original_name, bytes),
            Err(e) => return errors::json_error(e.status(), "invalid_multipart", e.body_text()),
        }
    };

    if bytes.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "file is empty");
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return errors::json_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            format!("file exceeds {MAX_IMAGE_BYTES} bytes"),
        );
    }

    let stored = match services.files.save(&original_name, &bytes).await {
        Ok(name) => name,
        Err(e) => return errors::file_storage_error_to_response(&e),
    };

    let previous = book.replace_image(stored.clone(), services.clock.now());

    let book = match services.books.update(book).await {
        Ok(Some(b)) => b,
        Ok(None) => {
            // Deleted concurrently; drop the orphaned upload.
            if let Err(e) = services.files.delete(&stored).await {
                warn!(file = %stored, error = %e, "failed to delete orphaned upload");
            }
            return errors::not_found("book not found");
        }
        Err(e) => return errors::book_store_error_to_response(&e),
    };

    if let Some(previous) = previous {
        if let Err(e) = services.files.delete(&previous).await {
            warn!(book_id = %book.id, file = %previous, error = %e, "failed to delete replaced image");
        }
    }

    info!(book_id = %book.id, file = %stored, size = bytes.len(), "book image uploaded");
    Json(book).into_response()
}
