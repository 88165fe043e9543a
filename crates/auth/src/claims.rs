use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookstore_core::UserId;

/// Name of the single application claim carried by a session token.
pub const SUBJECT_CLAIM: &str = "UserId";

/// Session token claim set.
///
/// The only application claim is the subject id. Role and username are never
/// embedded: the role is re-resolved on every request so that changes apply
/// without reissuing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Store-assigned id of the subject.
    #[serde(rename = "UserId")]
    pub user_id: UserId,

    pub iss: String,

    pub aud: String,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,
}

/// Deterministically check expiry of decoded claims.
///
/// Signature, issuer and audience are checked while decoding. `iat` is
/// informational only, so a token minted by a host whose clock runs ahead
/// is accepted until `exp`.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if now.timestamp() >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
