//! `bookstore-auth`: authentication and authorization boundary.
//!
//! This crate is decoupled from HTTP. Persistence is reached only through the
//! [`IdentityStore`] trait.

pub mod accounts;
pub mod augment;
pub mod authorize;
pub mod cache;
pub mod claims;
pub mod credentials;
pub mod identity;
pub mod in_memory_store;
pub mod principal;
pub mod roles;
pub mod store;
pub mod tokens;

pub use accounts::{AccountError, AccountService, AdminSeed};
pub use augment::ClaimsAugmentation;
pub use authorize::{authorize, AuthzError, Policy};
pub use cache::{CachedIdentityLookup, TtlCache, DEFAULT_IDENTITY_TTL_MINUTES};
pub use claims::{validate_claims, SessionClaims, TokenValidationError, SUBJECT_CLAIM};
pub use credentials::{CredentialError, CredentialVerifier};
pub use identity::{CredentialHash, Identity, NewIdentity};
pub use in_memory_store::InMemoryIdentityStore;
pub use principal::SecurityContext;
pub use roles::{Role, UnknownRole};
pub use store::{IdentityStore, StoreError};
pub use tokens::{TokenError, TokenService, TokenSettings};
