//! Identity store adapters.
//!
//! The in-memory store lives next to the trait in `bookstore-auth`.

pub mod postgres;

pub use postgres::PostgresIdentityStore;
