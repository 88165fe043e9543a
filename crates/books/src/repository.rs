use async_trait::async_trait;
use thiserror::Error;

use bookstore_core::BookId;

use crate::Book;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookStoreError {
    #[error("book store unavailable: {0}")]
    Unavailable(String),
}

/// Book persistence seam.
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Book>, BookStoreError>;

    async fn get(&self, id: BookId) -> Result<Option<Book>, BookStoreError>;

    async fn insert(&self, book: Book) -> Result<Book, BookStoreError>;

    /// Replace an existing book. `None` if it does not exist.
    async fn update(&self, book: Book) -> Result<Option<Book>, BookStoreError>;

    /// Remove a book, returning it. `None` if it did not exist.
    async fn delete(&self, id: BookId) -> Result<Option<Book>, BookStoreError>;
}
