//! Bounded least-recently-used cache for authorization decisions.
//!
//! # Architecture
//!
//! Entries live in a slab (`Vec<Node>`) threaded into a doubly-linked list
//! ordered by recency, with a `HashMap` from key to slab slot:
//!
//! ```text
//! index: key -> slot
//!
//!   head (most recent)                       tail (least recent)
//!   [slot 3] <-> [slot 0] <-> [slot 2] <-> [slot 1]
//! ```
//!
//! - **Get**: O(1) - index lookup, unlink, relink at head
//! - **Put**: O(1) - relink at head; when full, the tail slot is reused
//!
//! The slab never holds more than `capacity` nodes and nodes are only ever
//! replaced by eviction, so slots stay dense and no free list is needed.
//!
//! # Thread Safety
//!
//! Recency bookkeeping mutates the list on every `get`, so all access goes
//! through a single `parking_lot::Mutex`. Critical sections are O(1).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Default maximum number of cached decisions.
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Cache key identifying one authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    /// The principal the decision was made for.
    pub principal: String,
    /// The full document identifier.
    pub document_id: String,
}

impl DecisionKey {
    pub fn new(principal: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            document_id: document_id.into(),
        }
    }
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct LruState<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> LruState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn touch(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    /// Inserts or updates, evicting the tail when `capacity` is reached.
    /// Returns the evicted key, if any.
    fn put(&mut self, key: K, value: V, capacity: usize) -> Option<K> {
        if let Some(&slot) = self.index.get(&key) {
            self.nodes[slot].value = value;
            self.touch(slot);
            return None;
        }

        if self.nodes.len() < capacity {
            let slot = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.index.insert(key, slot);
            self.push_front(slot);
            return None;
        }

        // Full: reuse the least recently used slot
        let slot = self.tail?;
        self.unlink(slot);
        let evicted = std::mem::replace(&mut self.nodes[slot].key, key.clone());
        self.nodes[slot].value = value;
        self.index.remove(&evicted);
        self.index.insert(key, slot);
        self.push_front(slot);
        Some(evicted)
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded LRU cache safe for concurrent `get` and `put`.
///
/// Both `get` and `put` refresh the recency of the touched key. When an
/// insertion would exceed `capacity`, exactly the least recently touched
/// entry is evicted. There is no explicit invalidation.
pub struct AuthorizationCache<K, V> {
    state: Mutex<LruState<K, V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> std::fmt::Debug for AuthorizationCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCache")
            .field("capacity", &self.capacity)
            .field("len", &self.state.lock().nodes.len())
            .finish()
    }
}

impl<K, V> AuthorizationCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState::with_capacity(capacity.min(DEFAULT_CACHE_SIZE))),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns a clone of the cached value and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        match state.index.get(key).copied() {
            Some(slot) => {
                state.touch(slot);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(state.nodes[slot].value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or replaces a value and marks it most recently used.
    pub fn put(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let evicted = self.state.lock().put(key, value, self.capacity);
        if evicted.is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        let state = self.state.lock();
        let mut keys = Vec::with_capacity(state.nodes.len());
        let mut cursor = state.head;
        while let Some(slot) = cursor {
            keys.push(state.nodes[slot].key.clone());
            cursor = state.nodes[slot].next;
        }
        keys
    }
}
