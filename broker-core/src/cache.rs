//! Generic in-memory map with per-entry expiration.
//!
//! Three instances of this are used by the state machine: request-state,
//! fetch-token, and access-token. All three are independent; see the data
//! model notes on why a fetch token may outlive the state that created it.
use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

/// Default TTL applied by [`TtlCache::set_default`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry<T> {
    value: T,
    deadline: Instant,
}

/// A thread-safe map from string keys to `T`, where every entry expires after
/// its own TTL. Reads and writes are synchronized with a single
/// [`std::sync::RwLock`]; critical sections never touch the network or disk,
/// so a blocking lock is adequate.
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: RwLock<HashMap<String, Entry<T>>>,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> TtlCache<T> {
    /// Construct an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under `key`, or `None` if it is unknown or expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;

        if entry.deadline <= Instant::now() {
            return None;
        }

        Some(entry.value.clone())
    }

    /// Overwrite (or insert) the value under `key` with the given TTL.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.into(),
            Entry {
                value,
                deadline: Instant::now() + ttl,
            },
        );
    }

    /// Overwrite (or insert) the value under `key` with [`DEFAULT_TTL`].
    pub fn set_default(&self, key: impl Into<String>, value: T) {
        self.set(key, value, DEFAULT_TTL);
    }

    /// Remove the entry stored under `key`, if any.
    pub fn remove(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    /// Whether `key` names a live (non-expired) entry.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_is_absent() {
        let cache: TtlCache<u32> = TtlCache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn round_trips_within_ttl() {
        let cache = TtlCache::new();
        cache.set("k", 42, Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = TtlCache::new();
        cache.set("k", 42, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn overwrite_replaces_value_and_deadline() {
        let cache = TtlCache::new();
        cache.set("k", 1, Duration::from_secs(60));
        cache.set("k", 2, Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn remove_clears_entry() {
        let cache = TtlCache::new();
        cache.set("k", 1, Duration::from_secs(60));
        cache.remove("k");
        assert_eq!(cache.get("k"), None);
    }
}
