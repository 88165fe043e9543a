//! Read-through identity cache.
//!
//! Two independent namespaces (by username, by id), each filled lazily on a
//! positive store hit with a fixed TTL from insertion. Absent results are not
//! cached: a failed lookup is usually followed by a registration, and a
//! negative entry would make that username look free/taken incorrectly.
//!
//! Writes to the store do not touch the cache. A role change therefore becomes
//! visible to lookups only after the cached entry expires (bounded staleness,
//! at most one TTL).
//!
//! Concurrent misses on the same key may each read the store; the last write
//! wins and every written value is a complete store read.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use bookstore_core::{Clock, SystemClock, UserId};

use crate::identity::Identity;
use crate::store::{IdentityStore, StoreError};

/// Default lifetime of a cached identity.
pub const DEFAULT_IDENTITY_TTL_MINUTES: i64 = 30;

/// Number of entries below which expired entries are left in place.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    last_sweep: Option<DateTime<Utc>>,
}

impl<K: Eq + Hash, V> CacheState<K, V> {
    /// Drop expired entries at most once per `interval`, and only when large.
    fn maybe_sweep(&mut self, now: DateTime<Utc>, interval: Duration) {
        if self.entries.len() < SWEEP_THRESHOLD {
            return;
        }
        if self.last_sweep.is_some_and(|last| now - last < interval) {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        self.last_sweep = Some(now);
        debug!(removed = before - self.entries.len(), "swept expired cache entries");
    }
}

/// Thread-safe map with a fixed per-entry TTL.
///
/// Expired entries are invisible to `get` immediately; their memory is
/// reclaimed by a sweep that runs on insert at most once per TTL.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    state: RwLock<CacheState<K, V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                last_sweep: None,
            }),
            ttl,
        }
    }

    /// Live value for `key`, or `None` if absent or expired at `now`.
    pub fn get<Q>(&self, key: &Q, now: DateTime<Utc>) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let state = self.state.read().ok()?;
        state
            .entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V, now: DateTime<Utc>) {
        if let Ok(mut state) = self.state.write() {
            state.maybe_sweep(now, self.ttl);
            state.entries.insert(
                key,
                CacheEntry {
                    value,
                    expires_at: now + self.ttl,
                },
            );
        }
    }

    /// Entries currently held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caching front for [`IdentityStore`] lookups.
///
/// Constructed explicitly and shared via `Arc`; each instance owns its cache,
/// so tests get isolated state by building a new one.
pub struct CachedIdentityLookup {
    store: Arc<dyn IdentityStore>,
    by_username: TtlCache<String, Identity>,
    by_id: TtlCache<UserId, Identity>,
    clock: Arc<dyn Clock>,
}

impl CachedIdentityLookup {
    pub fn new(store: Arc<dyn IdentityStore>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn IdentityStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            by_username: TtlCache::new(ttl),
            by_id: TtlCache::new(ttl),
            clock,
        }
    }

    /// The underlying store (writes go straight to it).
    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub async fn by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        if let Some(identity) = self.by_username.get(username, self.clock.now()) {
            debug!(username = %username, "identity cache hit (username)");
            return Ok(Some(identity));
        }

        debug!(username = %username, "identity cache miss (username), reading store");
        let found = self.store.find_by_username(username).await?;
        if let Some(identity) = &found {
            self.by_username
                .insert(username.to_string(), identity.clone(), self.clock.now());
        }
        Ok(found)
    }

    pub async fn by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        if let Some(identity) = self.by_id.get(&id, self.clock.now()) {
            debug!(user_id = %id, "identity cache hit (id)");
            return Ok(Some(identity));
        }

        debug!(user_id = %id, "identity cache miss (id), reading store");
        let found = self.store.find_by_id(id).await?;
        if let Some(identity) = &found {
            self.by_id.insert(id, identity.clone(), self.clock.now());
        }
        Ok(found)
    }

    pub fn cached_usernames(&self) -> usize {
        self.by_username.len()
    }

    pub fn cached_ids(&self) -> usize {
        self.by_id.len()
    }
}
