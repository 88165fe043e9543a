use bookstore_core::UserId;

use crate::Role;

/// Per-request security state.
///
/// Moves forward only: `Anonymous` → `Authenticated` (token validated) →
/// `Augmented` (role resolved from the identity store). A request whose
/// subject can no longer be resolved stays `Authenticated` and holds no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityContext {
    #[default]
    Anonymous,
    Authenticated {
        subject: UserId,
    },
    Augmented {
        subject: UserId,
        role: Role,
    },
}

impl SecurityContext {
    pub fn authenticated(subject: UserId) -> Self {
        Self::Authenticated { subject }
    }

    pub fn subject(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { subject } | Self::Augmented { subject, .. } => Some(*subject),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Augmented { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject().is_some()
    }
}
