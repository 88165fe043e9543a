//! Session token issuance and validation (HS256 JWT).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;

use bookstore_core::{Clock, SystemClock, UserId};

use crate::claims::{validate_claims, SessionClaims};
use crate::identity::Identity;

/// Token parameters, normally taken from configuration.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub lifetime: Duration,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing secret is not configured")]
    MissingSigningKey,

    #[error("token lifetime must be positive")]
    InvalidLifetime,

    #[error("failed to sign token: {0}")]
    Signing(String),

    /// Bad signature, wrong issuer/audience, expired or malformed. The
    /// sub-cause is deliberately not exposed.
    #[error("invalid token")]
    Invalid,
}

/// Issues and validates bearer tokens.
///
/// The same secret signs and verifies; there is no server-side session state.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(settings: &TokenSettings) -> Result<Self, TokenError> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        if settings.secret.is_empty() {
            return Err(TokenError::MissingSigningKey);
        }
        if settings.lifetime <= Duration::zero() {
            return Err(TokenError::InvalidLifetime);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is checked by `validate_claims` against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            lifetime: settings.lifetime,
            clock,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign a token for `identity`, valid from now for the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, self.clock.now())
    }

    pub fn issue_at(&self, identity: &Identity, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = SessionClaims {
            user_id: identity.id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.lifetime).timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a presented token and return its subject.
    pub fn validate(&self, token: &str) -> Result<UserId, TokenError> {
        self.validate_at(token, self.clock.now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected while decoding");
                TokenError::Invalid
            })?;

        validate_claims(&data.claims, now).map_err(|e| {
            debug!(error = %e, "token rejected on expiry");
            TokenError::Invalid
        })?;

        Ok(data.claims.user_id)
    }
}
