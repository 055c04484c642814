//! Single-flight memoization.
//!
//! [`SingleFlight`] runs at most one computation per key at a time. The
//! first caller for a key becomes the leader and computes; callers arriving
//! while it runs block on the same slot and receive the leader's result.
//! Successful results stay cached. A failure is handed to the callers already
//! waiting and then evicted, so the next caller retries. If the leader
//! panics, waiters wake up and one of them takes over.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::IdbError;

enum Slot<V> {
    Pending,
    Done(V),
    Failed(IdbError),
    /// The leader unwound without publishing.
    Abandoned,
}

struct Entry<V> {
    slot: Mutex<Slot<V>>,
    ready: Condvar,
}

impl<V> Entry<V> {
    fn new() -> Self {
        Entry {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, slot: Slot<V>) {
        *self.slot.lock() = slot;
        self.ready.notify_all();
    }
}

/// Counters for a [`SingleFlight`] cache.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Calls answered from a published value.
    pub hits: AtomicU64,
    /// Computations started.
    pub computations: AtomicU64,
    /// Calls that blocked on another caller's computation.
    pub waits: AtomicU64,
}

/// A single-flight cache from `K` to `V`.
pub struct SingleFlight<K, V> {
    entries: Mutex<HashMap<K, Arc<Entry<V>>>>,
    stats: CacheStats,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        SingleFlight {
            entries: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of keys with a published value or a computation in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Return the cached value for `key`, computing it with `compute` if no
    /// other caller has.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Result<V, IdbError>
    where
        F: FnOnce() -> Result<V, IdbError>,
    {
        let mut compute = Some(compute);
        loop {
            let (entry, leader) = {
                let mut entries = self.entries.lock();
                match entries.get(&key) {
                    Some(e) => (Arc::clone(e), false),
                    None => {
                        let e = Arc::new(Entry::new());
                        entries.insert(key.clone(), Arc::clone(&e));
                        (e, true)
                    }
                }
            };

            if leader {
                let Some(f) = compute.take() else {
                    // Unreachable: a caller leads at most once per call.
                    return Err(IdbError::State("single-flight leader ran twice".to_string()));
                };
                return self.lead(&key, &entry, f);
            }

            let mut slot = entry.slot.lock();
            if matches!(*slot, Slot::Pending) {
                self.stats.waits.fetch_add(1, Ordering::Relaxed);
                while matches!(*slot, Slot::Pending) {
                    entry.ready.wait(&mut slot);
                }
            }
            match &*slot {
                Slot::Done(v) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(v.clone());
                }
                Slot::Failed(e) => return Err(e.clone()),
                Slot::Abandoned | Slot::Pending => {
                    debug!("single-flight leader abandoned its slot, retrying");
                }
            }
        }
    }

    fn lead<F>(&self, key: &K, entry: &Arc<Entry<V>>, compute: F) -> Result<V, IdbError>
    where
        F: FnOnce() -> Result<V, IdbError>,
    {
        self.stats.computations.fetch_add(1, Ordering::Relaxed);
        let mut guard = LeaderGuard {
            flight: self,
            key,
            entry,
            armed: true,
        };
        let result = compute();
        guard.armed = false;
        match &result {
            Ok(v) => entry.publish(Slot::Done(v.clone())),
            Err(e) => {
                entry.publish(Slot::Failed(e.clone()));
                self.evict(key, entry);
            }
        }
        result
    }

    /// Remove `key` if it still maps to `entry`.
    fn evict(&self, key: &K, entry: &Arc<Entry<V>>) {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| Arc::ptr_eq(e, entry)) {
            entries.remove(key);
        }
    }
}

/// Publishes `Abandoned` and evicts the slot if the leader unwinds.
struct LeaderGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    flight: &'a SingleFlight<K, V>,
    key: &'a K,
    entry: &'a Arc<Entry<V>>,
    armed: bool,
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if self.armed {
            self.flight.evict(self.key, self.entry);
            self.entry.publish(Slot::Abandoned);
        }
    }
}
