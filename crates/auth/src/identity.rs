//! The stored user record.

use chrono::{DateTime, Utc};

use bookstore_core::UserId;

use crate::Role;

/// One-way credential hash (PHC string).
///
/// Never rendered by `Debug` and never part of any response type.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHash(String);

impl CredentialHash {
    /// Wrap a hash read back from storage.
    pub fn from_stored(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("CredentialHash(<redacted>)")
    }
}

/// A user identity.
///
/// # Invariants
/// - `id` and `username` never change after creation.
/// - `username` is unique (case-sensitive) across the store.
/// - `created_at == updated_at` at creation. Both may be absent on records
///   written before timestamps existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub credential_hash: CredentialHash,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An identity that has not been persisted yet.
///
/// Stores fill in `id` (when absent) and the timestamps on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub id: Option<UserId>,
    pub username: String,
    pub credential_hash: CredentialHash,
    pub role: Role,
}

impl NewIdentity {
    /// A self-registered identity: always `Role::User`.
    pub fn user(username: impl Into<String>, credential_hash: CredentialHash) -> Self {
        Self {
            id: None,
            username: username.into(),
            credential_hash,
            role: Role::User,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Assign storage-level fields.
    pub fn into_identity(self, now: DateTime<Utc>) -> Identity {
        Identity {
            id: self.id.unwrap_or_default(),
            username: self.username,
            credential_hash: self.credential_hash,
            role: self.role,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}
