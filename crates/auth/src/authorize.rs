use thiserror::Error;

use crate::principal::SecurityContext;
use crate::Role;

/// Endpoint access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// No check.
    Public,
    /// Any authenticated subject, with or without a resolved role.
    Authenticated,
    /// An augmented subject holding exactly this role.
    Role(Role),
}

impl Policy {
    pub const ADMIN: Policy = Policy::Role(Role::Admin);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: requires role '{0}'")]
    Forbidden(Role),
}

/// Evaluate `policy` against a request's security context.
///
/// - No IO
/// - No panics
/// - Fail-closed: a context without a resolved role never satisfies a role policy
pub fn authorize(context: &SecurityContext, policy: &Policy) -> Result<(), AuthzError> {
    match policy {
        Policy::Public => Ok(()),
        Policy::Authenticated => {
            if context.is_authenticated() {
                Ok(())
            } else {
                Err(AuthzError::Unauthenticated)
            }
        }
        Policy::Role(required) => match context {
            SecurityContext::Anonymous => Err(AuthzError::Unauthenticated),
            SecurityContext::Augmented { role, .. } if role == required => Ok(()),
            _ => Err(AuthzError::Forbidden(*required)),
        },
    }
}
