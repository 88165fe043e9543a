//! Identity persistence boundary.
//!
//! The store is the authority for username uniqueness: an `insert` that would
//! duplicate a username must fail with `ConstraintViolation`, whatever the
//! caller checked beforehand.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use bookstore_core::UserId;

use crate::identity::{Identity, NewIdentity};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached (or failed mid-request).
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Narrow repository over user records.
///
/// "Not found" is `Ok(None)`, never an error.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError>;

    /// Assign storage-level fields (id when absent, timestamps) and persist.
    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError>;
}

#[async_trait]
impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        (**self).find_by_username(username).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        (**self).insert(identity).await
    }
}
