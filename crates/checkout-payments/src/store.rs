//! Idempotency Stores
//!
//! Stripe retries webhook deliveries and browsers double-submit, so both
//! endpoints keep a small record of what they have already handled.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use crate::checkout::CheckoutSession;
use crate::error::{CheckoutError, Result};

/// Entries kept before the oldest are evicted
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Record of webhook event ids that have been handled
pub trait EventLedger: Send + Sync {
    /// Record an event id. Returns `false` if it was already recorded.
    fn record(&self, event_id: &str) -> Result<bool>;

    /// Whether an event id has been recorded
    fn contains(&self, event_id: &str) -> Result<bool>;
}

/// A created session and the fingerprint of the parameters behind it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedSession {
    pub fingerprint: String,
    pub session: CheckoutSession,
}

/// Checkout sessions keyed by client idempotency token
pub trait SessionCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CachedSession>>;

    fn put(&self, key: &str, entry: &CachedSession) -> Result<()>;
}

fn poisoned<T>(_: T) -> CheckoutError {
    CheckoutError::Storage("lock poisoned".into())
}

struct LedgerInner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

/// In-memory event ledger, bounded to `capacity` ids
pub struct MemoryEventLedger {
    inner: RwLock<LedgerInner>,
    capacity: usize,
}

impl Default for MemoryEventLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(LedgerInner {
                seen: HashSet::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLedger for MemoryEventLedger {
    fn record(&self, event_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        if !inner.seen.insert(event_id.to_string()) {
            return Ok(false);
        }
        inner.order.push_back(event_id.to_string());

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }

        Ok(true)
    }

    fn contains(&self, event_id: &str) -> Result<bool> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.seen.contains(event_id))
    }
}

struct CacheInner {
    sessions: HashMap<String, CachedSession>,
    order: VecDeque<String>,
}

/// In-memory session cache, bounded to `capacity` keys
pub struct MemorySessionCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

impl Default for MemorySessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                sessions: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, key: &str) -> Result<Option<CachedSession>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.sessions.get(key).cloned())
    }

    fn put(&self, key: &str, entry: &CachedSession) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        if inner
            .sessions
            .insert(key.to_string(), entry.clone())
            .is_none()
        {
            inner.order.push_back(key.to_string());
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.sessions.remove(&oldest);
            }
        }

        Ok(())
    }
}
