//! Request-time claims augmentation.
//!
//! Tokens carry only a subject id. Before any policy is evaluated, the subject
//! is resolved through the identity cache and its current role attached.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::CachedIdentityLookup;
use crate::principal::SecurityContext;
use crate::store::StoreError;

pub struct ClaimsAugmentation {
    lookup: Arc<CachedIdentityLookup>,
}

impl ClaimsAugmentation {
    pub fn new(lookup: Arc<CachedIdentityLookup>) -> Self {
        Self { lookup }
    }

    /// Advance an `Authenticated` context to `Augmented`.
    ///
    /// Any other state is returned unchanged, so applying this twice is the
    /// same as applying it once. An unknown subject leaves the context
    /// `Authenticated` (no role, fail-closed). Store failures propagate.
    pub async fn augment(&self, context: SecurityContext) -> Result<SecurityContext, StoreError> {
        let SecurityContext::Authenticated { subject } = context else {
            return Ok(context);
        };

        match self.lookup.by_id(subject).await? {
            Some(identity) => {
                debug!(user_id = %subject, role = %identity.role, "security context augmented");
                Ok(SecurityContext::Augmented {
                    subject,
                    role: identity.role,
                })
            }
            None => {
                warn!(user_id = %subject, "token subject no longer exists; no role attached");
                Ok(context)
            }
        }
    }
}
