//! In-memory cache for storing key-value pairs.
//!
//! Uses moka's high-performance concurrent cache implementation.

use moka::sync::Cache;

/// Thread-safe in-memory cache without a size bound.
///
/// Marks enrollments that are currently being walked (`MemCache<EnrollmentId, i64>`).
/// Entries are never evicted, so a marker lives until it is removed.
#[derive(Clone)]
pub struct MemCache<K, V> {
    variables: Cache<K, V>,
}

impl<K, V> Default for MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new() -> Self {
        Self {
            variables: Cache::builder().build(),
        }
    }

    /// Insert only when `key` is vacant. Returns `true` when this call inserted.
    pub fn insert_if_absent(
        &self,
        key: K,
        value: V,
    ) -> bool {
        self.variables.entry(key).or_insert(value).is_fresh()
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.variables.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_if_absent_claims_once() {
        let cache: MemCache<String, i64> = MemCache::new();
        assert!(cache.insert_if_absent("e1".to_string(), 1));
        assert!(!cache.insert_if_absent("e1".to_string(), 2));

        cache.remove(&"e1".to_string());
        assert!(cache.insert_if_absent("e1".to_string(), 3));
    }

    #[test]
    fn test_markers_survive_many_entries() {
        let cache: MemCache<String, i64> = MemCache::new();
        for i in 0..20_000 {
            assert!(cache.insert_if_absent(format!("e{}", i), i));
        }
        for i in 0..20_000 {
            assert!(!cache.insert_if_absent(format!("e{}", i), -1));
        }
    }
}
