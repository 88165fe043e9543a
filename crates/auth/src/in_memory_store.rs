use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use bookstore_core::{Clock, SystemClock, UserId};

use crate::identity::{Identity, NewIdentity};
use crate::store::{IdentityStore, StoreError};
use crate::Role;

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<UserId, Identity>,
    ids_by_username: HashMap<String, UserId>,
}

/// In-memory identity store for tests/dev.
///
/// Uniqueness of `id` and `username` is enforced atomically under the write
/// lock, so concurrent inserts of the same username resolve to exactly one
/// winner.
pub struct InMemoryIdentityStore {
    records: RwLock<Records>,
    clock: Arc<dyn Clock>,
    reads: AtomicUsize,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            clock,
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of lookups served so far (cache tests use this to count misses).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change an identity's role in place, bypassing any cache in front of
    /// the store. Returns `false` when the id is unknown.
    pub fn set_role(&self, id: UserId, role: Role) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        match records.by_id.get_mut(&id) {
            Some(identity) => {
                identity.role = role;
                identity.updated_at = Some(self.clock.now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove an identity. Returns the removed record, if any.
    pub fn remove(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let removed = records.by_id.remove(&id);
        if let Some(identity) = &removed {
            records.ids_by_username.remove(&identity.username);
        }
        Ok(removed)
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory identity store lock poisoned".to_string())
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .ids_by_username
            .get(username)
            .and_then(|id| records.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.by_id.get(&id).cloned())
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        let identity = identity.into_identity(self.clock.now());
        let mut records = self.records.write().map_err(|_| poisoned())?;

        if records.ids_by_username.contains_key(&identity.username) {
            return Err(StoreError::ConstraintViolation(format!(
                "username '{}' already exists",
                identity.username
            )));
        }
        if records.by_id.contains_key(&identity.id) {
            return Err(StoreError::ConstraintViolation(format!(
                "id '{}' already exists",
                identity.id
            )));
        }

        records
            .ids_by_username
            .insert(identity.username.clone(), identity.id);
        records.by_id.insert(identity.id, identity.clone());
        Ok(identity)
    }
}
