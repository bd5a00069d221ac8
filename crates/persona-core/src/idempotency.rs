//! Idempotency key cache (§4.1): the Dispatch service's "same key within the
//! window returns the existing id" contract.
//!
//! A `DashMap` keyed by the caller-supplied idempotency key, value the id it
//! produced plus the `Instant` it was recorded. Eviction is lazy: a lookup
//! that finds an expired entry removes it and reports a miss, rather than
//! running a background sweep.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

pub struct IdempotencyCache {
    entries: DashMap<String, (Uuid, Instant)>,
    window: Duration,
}

impl IdempotencyCache {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    /// Returns the id already associated with `key`, if recorded within the
    /// window. Expired entries are removed as a side effect of the lookup.
    pub fn get(&self, key: &str) -> Option<Uuid> {
        let hit = self.entries.get(key).map(|e| *e);
        match hit {
            Some((id, recorded_at)) if recorded_at.elapsed() <= self.window => Some(id),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Records `id` for `key`, overwriting any prior entry.
    pub fn put(&self, key: String, id: Uuid) {
        self.entries.insert(key, (id, Instant::now()));
    }
}
