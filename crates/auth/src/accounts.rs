//! Registration and login flows.
//!
//! Registration: existence pre-check (cache-backed, advisory) → hash →
//! store insert (authoritative uniqueness). Login: lookup by username →
//! verify → issue token.

use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing::{info, warn};

use crate::cache::CachedIdentityLookup;
use crate::credentials::{CredentialError, CredentialVerifier};
use crate::identity::{CredentialHash, Identity, NewIdentity};
use crate::store::{IdentityStore, StoreError};
use crate::tokens::{TokenError, TokenService};
use crate::Role;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("username already exists")]
    DuplicateUsername,

    /// Unknown username and wrong password are indistinguishable.
    #[error("invalid username or password")]
    InvalidCredential,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("credential worker failed: {0}")]
    Worker(String),
}

/// Outcome of [`AccountService::ensure_admin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSeed {
    Created(Identity),
    AlreadyPresent(Identity),
}

pub struct AccountService {
    lookup: Arc<CachedIdentityLookup>,
    tokens: Arc<TokenService>,
    verifier: CredentialVerifier,
    /// Hash verified against when the username is unknown, so both login
    /// failures cost the same.
    decoy: Arc<OnceLock<CredentialHash>>,
}

impl AccountService {
    pub fn new(lookup: Arc<CachedIdentityLookup>, tokens: Arc<TokenService>) -> Self {
        Self {
            lookup,
            tokens,
            verifier: CredentialVerifier::new(),
            decoy: Arc::new(OnceLock::new()),
        }
    }

    /// Register a new identity with `Role::User`.
    pub async fn register(&self, username: &str, password: &str) -> Result<Identity, AccountError> {
        validate_credentials(username, password)?;
        self.create(username, password, Role::User).await
    }

    /// Exchange a username/password for a session token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AccountError> {
        let Some(identity) = self.lookup.by_username(username).await? else {
            self.verify_against_decoy(password).await;
            info!(username = %username, "login rejected");
            return Err(AccountError::InvalidCredential);
        };

        if !self.verify(password, identity.credential_hash.clone()).await? {
            info!(username = %username, "login rejected");
            return Err(AccountError::InvalidCredential);
        }

        let token = self.tokens.issue(&identity)?;
        info!(user_id = %identity.id, "login succeeded");
        Ok(token)
    }

    /// Create an `Admin` identity unless the username is already taken.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<AdminSeed, AccountError> {
        validate_credentials(username, password)?;

        if let Some(existing) = self.lookup.store().find_by_username(username).await? {
            if existing.role != Role::Admin {
                warn!(username = %username, role = %existing.role, "configured admin username exists without Admin role");
            }
            return Ok(AdminSeed::AlreadyPresent(existing));
        }

        match self.create(username, password, Role::Admin).await {
            Ok(identity) => Ok(AdminSeed::Created(identity)),
            Err(AccountError::DuplicateUsername) => {
                let existing = self
                    .lookup
                    .store()
                    .find_by_username(username)
                    .await?
                    .ok_or(AccountError::DuplicateUsername)?;
                Ok(AdminSeed::AlreadyPresent(existing))
            }
            Err(e) => Err(e),
        }
    }

    async fn create(&self, username: &str, password: &str, role: Role) -> Result<Identity, AccountError> {
        // Advisory only: two concurrent registrations can both pass this.
        if self.lookup.by_username(username).await?.is_some() {
            info!(username = %username, "registration rejected: username taken");
            return Err(AccountError::DuplicateUsername);
        }

        let hash = self.hash(password).await?;

        match self
            .lookup
            .store()
            .insert(NewIdentity::user(username, hash).with_role(role))
            .await
        {
            Ok(identity) => {
                info!(user_id = %identity.id, username = %identity.username, role = %identity.role, "identity registered");
                Ok(identity)
            }
            Err(StoreError::ConstraintViolation(msg)) => {
                info!(username = %username, reason = %msg, "registration rejected by store constraint");
                Err(AccountError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn hash(&self, password: &str) -> Result<CredentialHash, AccountError> {
        let verifier = self.verifier.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AccountError::Worker(e.to_string()))?
            .map_err(AccountError::from)
    }

    async fn verify(&self, password: &str, hash: CredentialHash) -> Result<bool, AccountError> {
        let verifier = self.verifier.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .map_err(|e| AccountError::Worker(e.to_string()))
    }

    async fn verify_against_decoy(&self, password: &str) {
        let verifier = self.verifier.clone();
        let decoy = self.decoy.clone();
        let password = password.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            let hash = decoy.get_or_init(|| {
                verifier
                    .hash("decoy-credential")
                    .unwrap_or_else(|_| CredentialHash::from_stored(""))
            });
            verifier.verify(&password, hash)
        })
        .await;
        if let Err(e) = outcome {
            warn!(error = %e, "decoy credential verification task failed");
        }
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), AccountError> {
    if username.trim().is_empty() {
        return Err(AccountError::Validation("username must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(AccountError::Validation("password must not be empty".to_string()));
    }
    Ok(())
}
