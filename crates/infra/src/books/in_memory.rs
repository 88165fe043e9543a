use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use bookstore_books::{Book, BookRepository, BookStoreError};
use bookstore_core::BookId;

/// In-memory book repository.
///
/// Intended for tests/dev. Listing is ordered by creation time, then id.
#[derive(Debug, Default)]
pub struct InMemoryBookRepository {
    books: RwLock<HashMap<BookId, Book>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> BookStoreError {
    BookStoreError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn list(&self) -> Result<Vec<Book>, BookStoreError> {
        let books = self.books.read().map_err(poisoned)?;
        let mut all: Vec<Book> = books.values().cloned().collect();
        all.sort_by_key(|b| (b.created_at, *b.id.as_uuid()));
        Ok(all)
    }

    async fn get(&self, id: BookId) -> Result<Option<Book>, BookStoreError> {
        let books = self.books.read().map_err(poisoned)?;
        Ok(books.get(&id).cloned())
    }

    async fn insert(&self, book: Book) -> Result<Book, BookStoreError> {
        let mut books = self.books.write().map_err(poisoned)?;
        books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, book: Book) -> Result<Option<Book>, BookStoreError> {
        let mut books = self.books.write().map_err(poisoned)?;
        match books.get_mut(&book.id) {
            Some(slot) => {
                *slot = book.clone();
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: BookId) -> Result<Option<Book>, BookStoreError> {
        let mut books = self.books.write().map_err(poisoned)?;
        Ok(books.remove(&id))
    }
}
