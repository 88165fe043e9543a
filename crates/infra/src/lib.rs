//! Infrastructure layer: database and filesystem adapters.

pub mod books;
pub mod identity;
pub mod storage;

pub use books::InMemoryBookRepository;
pub use identity::PostgresIdentityStore;
pub use storage::LocalFileStorage;
