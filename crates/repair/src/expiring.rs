use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use tokio::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A map whose entries silently disappear once older than its timeout.
///
/// Expired entries are dropped lazily on access and in bulk by
/// [`ExpiringMap::purge_expired`].
#[derive(Debug)]
pub struct ExpiringMap<K, V> {
    timeout: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V> ExpiringMap<K, V> {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: HashMap::new(),
        }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        entry.inserted_at.elapsed() > self.timeout
    }

    /// Insert `value`, restarting its clock. Returns the live previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };

        let previous = self.entries.insert(key, entry)?;
        (!self.is_expired(&previous)).then_some(previous.value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.get(key)?;
        (!self.is_expired(entry)).then_some(&entry.value)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        (!self.is_expired(&entry)).then_some(entry.value)
    }

    /// Drop every expired entry, returning how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        let timeout = self.timeout;

        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() <= timeout);

        before.saturating_sub(self.entries.len())
    }

    /// Number of entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
