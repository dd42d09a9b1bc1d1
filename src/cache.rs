use crate::LoadError;
use chashmap::CHashMap;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

/// Holds the results of loading a batch of data from a [`Fetcher`](crate::Fetcher).
/// Implementors of [`Fetcher`](crate::Fetcher) should call [`insert`](Cache::insert)
/// for each value that was loaded in a batch request.
pub struct Cache<'a, K, V> {
    map_ref: &'a CHashMap<K, CacheState<V>>,
}

impl<'a, K, V> Cache<'a, K, V>
where
    K: Clone + Hash + Eq,
    V: Clone,
{
    /// Insert a value into the cache for the given key.
    pub fn insert(&mut self, key: K, value: V) {
        self.map_ref.insert(key, CacheState::Loaded(value));
    }

    pub(crate) fn mark_keys_not_found(&mut self, keys: &[K]) {
        for key in keys {
            self.map_ref
                .alter(key.clone(), |value| Some(value.unwrap_or(CacheState::NotFound)));
        }
    }
}

/// Collections materialized during one session. Cloning is shallow.
#[derive(Clone)]
pub(crate) struct CacheStore<K, V> {
    map: Arc<CHashMap<K, CacheState<V>>>,
}

impl<K, V> CacheStore<K, V>
where
    K: Clone + Hash + Eq,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        let map = Arc::new(CHashMap::new());
        CacheStore { map }
    }

    pub(crate) fn as_cache(&'_ self) -> Cache<'_, K, V> {
        let map_ref = &*self.map;
        Cache { map_ref }
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Keys from `keys` with no cache entry, deduplicated, in input order.
    pub(crate) fn pending_keys(&self, keys: &[K]) -> Vec<K> {
        let mut seen = HashSet::new();
        keys.iter()
            .filter(|key| !self.contains(key) && seen.insert(*key))
            .cloned()
            .collect()
    }

    /// Returns `None` if any key is still pending.
    pub(crate) fn lookup(&self, keys: &[K]) -> Option<Result<Vec<V>, LoadError>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let state = self.map.get(key)?;
            match &*state {
                CacheState::Loaded(value) => values.push(value.clone()),
                CacheState::NotFound => return Some(Err(LoadError::NotFound)),
            }
        }
        Some(Ok(values))
    }
}

#[derive(Clone)]
enum CacheState<V> {
    Loaded(V),
    NotFound,
}
