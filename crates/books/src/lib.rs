//! Book catalog domain.
//!
//! Pure model and validation plus the persistence/file-storage seams; the
//! adapters live in `bookstore-infra`.

pub mod book;
pub mod repository;
pub mod storage;

pub use book::{Book, BookInput};
pub use repository::{BookRepository, BookStoreError};
pub use storage::{validate_file_name, FileStorage, FileStorageError};
