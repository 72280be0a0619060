//! Read cache keyed by query identity.
//!
//! The cache is an accelerator only: dropping any entry, or all of them, is always correct.
//! Invalidation removes the matching entries and bumps an epoch, and a fetch that began under
//! an older epoch is not stored, so a read racing a mutation cannot reinstate pre-mutation rows.
//! The number of entries is bounded; a put that would exceed the bound flushes first.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{
    AccessLogEntry, Actor, DashboardStats, Property, Role, UserId, UserWithRole,
};

/// Entry bound used by [`QueryCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Resource families a cached read can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Properties,
    PendingProperties,
    PropertyDetail,
    Dashboard,
    Users,
    AccessLogs,
}

impl ResourceKind {
    /// Kinds whose results depend on listing rows.
    pub const LISTING_READS: [ResourceKind; 4] = [
        ResourceKind::Properties,
        ResourceKind::PendingProperties,
        ResourceKind::PropertyDetail,
        ResourceKind::Dashboard,
    ];
}

/// Deterministic identity of a read: actor, actor role, resource, and canonical filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub actor: UserId,
    pub role: Role,
    pub resource: ResourceKind,
    pub scope: String,
}

impl QueryKey {
    /// Builds a key from any serializable filter. The JSON rendering is canonical because
    /// struct fields serialize in declaration order. A filter that cannot be rendered has no
    /// identity, so `None` is returned and the read goes straight to the store.
    pub fn new<F: Serialize>(actor: &Actor, resource: ResourceKind, filter: &F) -> Option<Self> {
        match serde_json::to_string(filter) {
            Ok(scope) => Some(Self {
                actor: actor.id.clone(),
                role: actor.role,
                resource,
                scope,
            }),
            Err(err) => {
                warn!(?resource, %err, "filter has no canonical form; bypassing cache");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedRows {
    Properties(Vec<Property>),
    Property(Property),
    Dashboard(DashboardStats),
    Users(Vec<UserWithRole>),
    AccessLogs(Vec<AccessLogEntry>),
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<QueryKey, CachedRows>,
    epoch: u64,
}

/// Token handed out when a fetch begins; see [`QueryCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug)]
pub struct QueryCache {
    state: Mutex<State>,
    capacity: usize,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of zero disables caching.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A poisoned lock means a panic mid-update; the contents are discarded rather than
    /// trusted.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            self.state.clear_poison();
            let mut guard = poisoned.into_inner();
            guard.entries.clear();
            guard.epoch += 1;
            guard
        })
    }

    /// Cached rows for `key`, if any.
    pub fn get(&self, key: &QueryKey) -> Option<CachedRows> {
        self.state().entries.get(key).cloned()
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.state().epoch)
    }

    /// Stores rows fetched under `ticket`. Returns `false` when an invalidation happened
    /// since the ticket was issued, in which case nothing is stored.
    pub fn put(&self, key: QueryKey, rows: CachedRows, ticket: FetchTicket) -> bool {
        let mut state = self.state();
        if state.epoch != ticket.0 || self.capacity == 0 {
            return false;
        }
        if state.entries.len() >= self.capacity && !state.entries.contains_key(&key) {
            debug!(entries = state.entries.len(), "cache full; flushing");
            state.entries.clear();
        }
        state.entries.insert(key, rows);
        true
    }

    /// Removes every entry matching `predicate`. Returns how many were removed.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&QueryKey) -> bool,
    {
        let mut state = self.state();
        state.epoch += 1;
        let before = state.entries.len();
        state.entries.retain(|key, _| !predicate(key));
        before - state.entries.len()
    }

    pub fn invalidate_resources(&self, kinds: &[ResourceKind]) -> usize {
        self.invalidate(|key| kinds.contains(&key.resource))
    }

    /// Drops every identity addressed by `actor`, e.g. after their role changed.
    pub fn invalidate_actor(&self, actor: &UserId) -> usize {
        self.invalidate(|key| key.actor == *actor)
    }

    /// Removes the actor's entries (session teardown).
    pub fn evict_actor(&self, actor: &UserId) -> usize {
        self.invalidate_actor(actor)
    }

    pub fn flush(&self) {
        let mut state = self.state();
        state.epoch += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
