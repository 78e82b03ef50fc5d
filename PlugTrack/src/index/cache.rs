//! Memory bound for decoded records with LRU eviction
//!
//! Entries keep their decoded payload until [`Entry::free`] is called. The
//! cache tracks which entries hold a payload and frees the least recently
//! used ones once the byte budget is exceeded.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use simdbpf::Entry;

/// Cache statistics for debugging
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryCacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub total_bytes_cached: usize,
}

#[derive(Debug)]
struct Slot {
    entry: Arc<Entry>,
    bytes: usize,
    stamp: u64,
}

#[derive(Debug, Default)]
struct State {
    /// Cached entries, keyed by entry identity.
    slots: HashMap<usize, Slot>,
    /// Access order for LRU eviction (oldest stamp first).
    access_order: BTreeMap<u64, usize>,
    next_stamp: u64,
    stats: EntryCacheStats,
}

impl State {
    fn bump(&mut self, key: usize) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        if let Some(slot) = self.slots.get_mut(&key) {
            self.access_order.remove(&slot.stamp);
            slot.stamp = stamp;
            self.access_order.insert(stamp, key);
        }
    }
}

/// LRU cache of loaded entries, bounded by payload bytes.
#[derive(Debug)]
pub struct EntryCache {
    state: Mutex<State>,
    max_bytes: usize,
}

fn key(entry: &Arc<Entry>) -> usize {
    Arc::as_ptr(entry) as usize
}

impl EntryCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Mark an entry as most recently used. Returns whether it was cached.
    pub fn touch(&self, entry: &Arc<Entry>) -> bool {
        let mut state = self.lock();
        let key = key(entry);
        if state.slots.contains_key(&key) {
            state.bump(key);
            true
        } else {
            false
        }
    }

    /// Add a loaded entry, then free least recently used entries until the
    /// total fits the budget. Evicted entries are freed before this returns.
    pub fn insert(&self, entry: &Arc<Entry>, bytes: usize) {
        let mut guard = self.lock();
        let state = &mut *guard;
        let key = key(entry);

        if let Some(slot) = state.slots.get_mut(&key) {
            let old = std::mem::replace(&mut slot.bytes, bytes);
            state.stats.total_bytes_cached = state.stats.total_bytes_cached - old + bytes;
            state.bump(key);
        } else {
            let stamp = state.next_stamp;
            state.next_stamp += 1;
            state.slots.insert(
                key,
                Slot {
                    entry: Arc::clone(entry),
                    bytes,
                    stamp,
                },
            );
            state.access_order.insert(stamp, key);
            state.stats.total_bytes_cached += bytes;
        }

        while state.stats.total_bytes_cached > self.max_bytes {
            let Some((_, oldest)) = state.access_order.pop_first() else {
                break;
            };
            if let Some(slot) = state.slots.remove(&oldest) {
                state.stats.total_bytes_cached -= slot.bytes;
                state.stats.evictions += 1;
                slot.entry.free();
            }
        }
    }

    /// Record a read of `entry`: a hit moves it to most recent, a miss
    /// inserts it with its current payload size.
    pub fn admit(&self, entry: &Arc<Entry>) {
        if self.touch(entry) {
            self.lock().stats.hits += 1;
        } else {
            self.lock().stats.misses += 1;
            self.insert(entry, entry.loaded_bytes());
        }
    }

    pub fn contains(&self, entry: &Arc<Entry>) -> bool {
        self.lock().slots.contains_key(&key(entry))
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.lock().stats.total_bytes_cached
    }

    pub fn stats(&self) -> EntryCacheStats {
        self.lock().stats.clone()
    }

    /// Free and forget every cached entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        for slot in state.slots.values() {
            slot.entry.free();
        }
        state.slots.clear();
        state.access_order.clear();
        state.stats.total_bytes_cached = 0;
    }
}
