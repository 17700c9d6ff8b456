//! Thread-safe set of handle keys: the outgoing edges of one graph node.

use std::fmt;

use dashmap::DashSet;

use crate::Handle;

/// Concurrent set of the handles an object depends on.
///
/// `add` is idempotent so a duplicated edge declaration never takes a second
/// reference on the dependency. Iteration goes through [`snapshot`](Self::snapshot),
/// which copies the members out and holds no shard lock afterwards.
pub struct DependencySet<H: Handle> {
    inner: DashSet<H>,
}

impl<H: Handle> DependencySet<H> {
    pub fn new() -> Self {
        Self {
            inner: DashSet::new(),
        }
    }

    /// Returns `true` if `key` was not already present.
    pub fn add(&self, key: H) -> bool {
        self.inner.insert(key)
    }

    /// Returns `true` if `key` was present.
    pub fn remove(&self, key: &H) -> bool {
        self.inner.remove(key).is_some()
    }

    pub fn contains(&self, key: &H) -> bool {
        self.inner.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Copies the current members out. Order is unspecified.
    pub fn snapshot(&self) -> Vec<H> {
        self.inner.iter().map(|key| key.key().clone()).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<H> {
        self.snapshot().into_iter()
    }
}

impl<H: Handle> Default for DependencySet<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle> Clone for DependencySet<H> {
    fn clone(&self) -> Self {
        self.iter().collect()
    }
}

impl<H: Handle> fmt::Debug for DependencySet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.snapshot()).finish()
    }
}

impl<H: Handle> FromIterator<H> for DependencySet<H> {
    fn from_iter<I: IntoIterator<Item = H>>(iter: I) -> Self {
        let set = Self::new();
        for key in iter {
            set.add(key);
        }
        set
    }
}

impl<H: Handle> Extend<H> for DependencySet<H> {
    fn extend<I: IntoIterator<Item = H>>(&mut self, iter: I) {
        for key in iter {
            self.add(key);
        }
    }
}

impl<H: Handle> IntoIterator for &DependencySet<H> {
    type Item = H;
    type IntoIter = std::vec::IntoIter<H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
