// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-to-live cache in front of repeated store reads.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use rolekeeper_core::Clock;

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// A concurrent map whose entries expire `ttl` after insertion.
///
/// Expiry is judged against the injected [`Clock`], so tests can move time
/// forward deterministically. Expired entries are dropped on read, and
/// inserts sweep the whole map at most once per `ttl`.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    /// Unix millis of the last full sweep.
    last_sweep: AtomicI64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let last_sweep = AtomicI64::new(clock.now().timestamp_millis());
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            last_sweep,
        }
    }

    /// Returns a live entry, evicting it if it has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let hit = self.entries.get(key).map(|e| {
            if e.expires_at > now {
                Some(e.value.clone())
            } else {
                None
            }
        })?;
        if hit.is_none() {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        hit
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.sweep(now);
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    fn sweep(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now_ms - last < self.ttl.num_milliseconds() {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.entries.retain(|_, e| e.expires_at > now);
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolekeeper_test_utils::ManualClock;

    fn cache(clock: &Arc<ManualClock>) -> TtlCache<u64, String> {
        TtlCache::new(Duration::seconds(60), clock.clone())
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&clock);
        cache.insert(1, "one".into());

        clock.advance(Duration::seconds(59));
        assert_eq!(cache.get(&1).as_deref(), Some("one"));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_refreshes_expiry() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&clock);
        cache.insert(1, "old".into());
        clock.advance(Duration::seconds(45));
        cache.insert(1, "new".into());
        clock.advance(Duration::seconds(45));
        assert_eq!(cache.get(&1).as_deref(), Some("new"));
    }

    #[test]
    fn insert_sweeps_expired_keys_nobody_reads() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&clock);
        for key in 0..500 {
            cache.insert(key, "miss".into());
        }
        clock.advance(Duration::seconds(30));
        cache.insert(1_000, "fresh".into());
        assert_eq!(cache.len(), 501);

        clock.advance(Duration::seconds(31));
        cache.insert(1_001, "later".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1_000).as_deref(), Some("fresh"));
    }

    #[test]
    fn invalidate_and_clear() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(&clock);
        cache.insert(1, "a".into());
        cache.insert(2, "b".into());

        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
