// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
use fnv::FnvHashMap;
use std::{collections::hash_map::Entry, hash::Hash};
use tokio::time::{Duration, Instant};

/// A set whose entries carry the instant they were committed.
///
/// Entries never expire on their own; the owner drives expiration by
/// calling [expire](TimedSet::expire) with the current time and a ttl.
/// The set itself performs no clock reads, which keeps it trivially
/// testable.
pub struct TimedSet<T> {
    inner: FnvHashMap<T, Instant>,
}

impl<T> TimedSet<T> {
    /// Create a new, empty set.
    pub fn new() -> Self {
        Self {
            inner: FnvHashMap::default(),
        }
    }

    /// Returns the number of entries in the set.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all entries in the set, in no particular
    /// order.
    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.inner.keys()
    }
}

impl<T: Hash + Eq> TimedSet<T> {
    /// Returns whether the set contains `val`.
    pub fn contains(&self, val: &T) -> bool {
        self.inner.contains_key(val)
    }

    /// Insert `val`, committed at `at`. Returns whether it was inserted;
    /// re-inserting an existing entry keeps the original commit time.
    pub fn insert(&mut self, val: T, at: Instant) -> bool {
        match self.inner.entry(val) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(at);
                true
            }
        }
    }

    /// Remove and return every entry committed at least `ttl` before `now`.
    pub fn expire(&mut self, now: Instant, ttl: Duration) -> Vec<T>
    where T: Clone {
        let expired: Vec<T> = (self.inner.iter())
            .filter(|(_, at)| now.duration_since(**at) >= ttl)
            .map(|(val, _)| val.clone())
            .collect();

        for val in &expired {
            self.inner.remove(val);
        }

        expired
    }
}
