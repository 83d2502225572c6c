//! SliceMap - a concurrent map of sorted value sequences
//!
//! Each key is associated with an ordered, duplicate-free sequence of
//! values. Within a sequence, membership tests and single-value mutations
//! are `O(log n)` searches (with an `O(n)` shift on mutation), and
//! [insert_batch](SliceMap::insert_batch) merges a whole batch in linear
//! time. Across keys no ordering is guaranteed.
//!
//! The whole map sits behind a single reader/writer lock. Readers proceed
//! in parallel with each other; writers are exclusive. Every operation is
//! synchronous and runs to completion once it holds the lock, so blocking
//! is strictly mutual exclusion, never an indefinite wait.
//!
//! Nothing returned by a read aliases live storage: [get](SliceMap::get)
//! copies the sequence inside the critical section, and the traversals
//! call the visitor under the read lock with borrowed pairs that can not
//! outlive the pass. There is no escape hatch to the lock or the backing
//! storage.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::iter::FromIterator;

use parking_lot::RwLock;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, SerializeMap, Serializer},
};

#[cfg(feature = "serde")]
use crate::utils::MapCollector;

use crate::internals::svec::SortedVec;

#[cfg(feature = "ahash")]
use ahash::RandomState;

#[cfg(all(feature = "foldhash", not(feature = "ahash")))]
use foldhash::fast::RandomState;

#[cfg(all(not(feature = "ahash"), not(feature = "foldhash")))]
use std::collections::hash_map::RandomState;

/// A concurrent map from keys to ordered, duplicate-free value sequences.
///
/// This structure can be used in locations where you would otherwise
/// maintain a `RwLock<HashMap<K, Vec<V>>>` by hand and re-sort on every
/// mutation. The sequences stay strictly increasing under any interleaving
/// of operations, duplicates are folded away on insertion, and a key whose
/// sequence becomes empty is removed entirely - an empty sequence is never
/// observable.
///
/// All operations take `&self`; the lock lives inside. Mutating operations
/// (`insert`, `remove`, `remove_key`, `insert_batch`) hold exclusive access
/// for their full duration. Pure reads (`contains`, `get`, `count`, the
/// traversals) hold shared access and may proceed in parallel.
///
/// Every operation is total over its input domain: absent keys and values
/// degrade to no-ops or `None`, never errors.
///
/// # Examples
/// ```
/// use slicemap::SliceMap;
///
/// let smap: SliceMap<u64, u64> = SliceMap::new();
///
/// smap.insert(1, 20);
/// smap.insert(1, 10);
/// smap.insert_batch(2, vec![8, 3, 5, 3]);
///
/// assert_eq!(smap.get(&1), Some(vec![10, 20]));
/// assert_eq!(smap.get(&2), Some(vec![3, 5, 8]));
/// assert!(smap.contains(&2, &5));
/// assert_eq!(smap.count(), 5);
///
/// // Removing the last value under a key removes the key itself.
/// smap.remove(&1, &10);
/// smap.remove(&1, &20);
/// assert_eq!(smap.get(&1), None);
/// ```
pub struct SliceMap<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Ord + Clone + Debug,
{
    inner: RwLock<HashMap<K, SortedVec<V>, RandomState>>,
}

impl<K: Hash + Eq + Clone + Debug, V: Ord + Clone + Debug> Default for SliceMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Ord + Clone + Debug> SliceMap<K, V> {
    /// Construct a new, empty map.
    pub fn new() -> Self {
        SliceMap {
            inner: RwLock::new(HashMap::default()),
        }
    }

    /// Add `value` to the sequence under `key`, keeping the sequence sorted.
    /// If the key is absent a new single-element sequence is created. If the
    /// value is already present this is a no-op.
    pub fn insert(&self, key: K, value: V) {
        tracing::trace!(?key, ?value, "insert");
        let mut inner = self.inner.write();
        match inner.entry(key) {
            Entry::Occupied(mut e) => {
                e.get_mut().insert(value);
            }
            Entry::Vacant(e) => {
                e.insert(SortedVec::with_value(value));
            }
        }
    }

    /// Remove `value` from the sequence under `key`. If this empties the
    /// sequence the key is removed entirely. Removing an absent key or
    /// value is a no-op, so the operation is idempotent.
    pub fn remove(&self, key: &K, value: &V) {
        tracing::trace!(?key, ?value, "remove");
        let mut inner = self.inner.write();
        if let Some(svec) = inner.get_mut(key) {
            if svec.remove(value) && svec.is_empty() {
                inner.remove(key);
            }
        }
    }

    /// Remove `key` and its entire sequence, regardless of contents. No-op
    /// if the key is absent.
    pub fn remove_key(&self, key: &K) {
        tracing::trace!(?key, "remove_key");
        let mut inner = self.inner.write();
        inner.remove(key);
    }

    /// True if `value` is present in the sequence under `key`.
    pub fn contains(&self, key: &K, value: &V) -> bool {
        let inner = self.inner.read();
        inner.get(key).map_or(false, |svec| svec.contains(value))
    }

    /// The total number of values across all keys. This is a full scan of
    /// the map, not a cached figure - callers needing frequent counts
    /// should maintain their own counter externally.
    pub fn count(&self) -> usize {
        let inner = self.inner.read();
        inner.values().map(|svec| svec.len()).sum()
    }

    /// The number of keys currently present.
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.len()
    }

    /// True if the map holds no keys.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.is_empty()
    }

    /// A snapshot copy of the sequence under `key`, in ascending order, or
    /// `None` if the key is absent.
    ///
    /// The copy is taken while the read lock is held and does not alias
    /// internal storage: later mutation of the map will not change it, and
    /// mutating it will not affect the map.
    pub fn get(&self, key: &K) -> Option<Vec<V>> {
        let inner = self.inner.read();
        inner.get(key).map(|svec| svec.to_vec())
    }

    /// Add a whole batch of values under `key`. The batch may be unsorted
    /// and contain duplicates; it is sorted and deduplicated before the
    /// lock is taken. An absent key receives the batch directly, a present
    /// key is merged with it in `O(n + m)` - strictly better than `m`
    /// sequential [insert](SliceMap::insert) calls.
    pub fn insert_batch(&self, key: K, values: Vec<V>) {
        tracing::trace!(?key, batch_len = values.len(), "insert_batch");
        // Sort and dedup the caller's copy outside the critical section.
        let batch = SortedVec::from_unsorted(values);
        if batch.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        match inner.entry(key) {
            Entry::Occupied(mut e) => e.get_mut().merge(batch),
            Entry::Vacant(e) => {
                e.insert(batch);
            }
        }
    }

    /// Visit every (key, value) pair. Values are visited in ascending order
    /// within a key; the order of keys is unspecified. The visitor returns
    /// whether to continue - returning `false` stops the traversal without
    /// visiting the remaining pairs. Each call is a fresh pass.
    ///
    /// The read lock is held for the whole pass, so the traversal observes
    /// one consistent state of the map. Keep visitors short: a writer can
    /// not proceed until the pass completes.
    pub fn for_each_value<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let inner = self.inner.read();
        'pass: for (key, svec) in inner.iter() {
            for value in svec.iter() {
                if !f(key, value) {
                    break 'pass;
                }
            }
        }
    }

    /// Visit every key, in unspecified order. Same contract as
    /// [for_each_value](SliceMap::for_each_value), keys only.
    pub fn for_each_key<F>(&self, mut f: F)
    where
        F: FnMut(&K) -> bool,
    {
        let inner = self.inner.read();
        for key in inner.keys() {
            if !f(key) {
                break;
            }
        }
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Ord + Clone + Debug> FromIterator<(K, V)>
    for SliceMap<K, V>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = SliceMap::new();
        {
            let mut inner = map.inner.write();
            for (key, value) in iter {
                inner.entry(key).or_default().insert(value);
            }
        }
        map
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Ord + Clone + Debug> FromIterator<(K, Vec<V>)>
    for SliceMap<K, V>
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<V>)>>(iter: I) -> Self {
        let map = SliceMap::new();
        {
            let mut inner = map.inner.write();
            for (key, values) in iter {
                let batch = SortedVec::from_unsorted(values);
                if batch.is_empty() {
                    continue;
                }
                match inner.entry(key) {
                    Entry::Occupied(mut e) => e.get_mut().merge(batch),
                    Entry::Vacant(e) => {
                        e.insert(batch);
                    }
                }
            }
        }
        map
    }
}

impl<K: Hash + Eq + Clone + Debug, V: Ord + Clone + Debug> Extend<(K, V)> for SliceMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let mut inner = self.inner.write();
        for (key, value) in iter {
            inner.entry(key).or_default().insert(value);
        }
    }
}

#[cfg(feature = "serde")]
impl<K, V> Serialize for SliceMap<K, V>
where
    K: Serialize + Hash + Eq + Clone + Debug,
    V: Serialize + Ord + Clone + Debug,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let inner = self.inner.read();
        let mut state = serializer.serialize_map(Some(inner.len()))?;

        for (key, svec) in inner.iter() {
            state.serialize_entry(key, svec.as_slice())?;
        }

        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> Deserialize<'de> for SliceMap<K, V>
where
    K: Deserialize<'de> + Hash + Eq + Clone + Debug,
    V: Deserialize<'de> + Ord + Clone + Debug,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Each sequence passes back through the sort/dedup path, so a
        // malformed document can not violate the ordering invariant.
        deserializer.deserialize_map(MapCollector::<Self, K, Vec<V>>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::SliceMap;

    #[test]
    fn test_slicemap_insert_get() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 10);
        smap.insert(1, 20);
        smap.insert(2, 10);

        assert_eq!(smap.get(&1), Some(vec![10, 20]));
        assert_eq!(smap.get(&2), Some(vec![10]));
        assert_eq!(smap.count(), 3);
        assert!(smap.contains(&1, &20));
        assert!(!smap.contains(&1, &30));
        assert!(!smap.contains(&3, &10));
    }

    #[test]
    fn test_slicemap_insert_idempotent() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 10);
        smap.insert(1, 10);
        assert_eq!(smap.get(&1), Some(vec![10]));
        assert_eq!(smap.count(), 1);
    }

    #[test]
    fn test_slicemap_remove() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 10);
        smap.insert(1, 20);
        smap.insert(2, 10);

        smap.remove(&1, &10);
        assert_eq!(smap.get(&1), Some(vec![20]));
        assert!(!smap.contains(&1, &10));

        // Removing the last value drops the key entirely.
        smap.remove(&1, &20);
        assert_eq!(smap.get(&1), None);
        assert_eq!(smap.count(), 1);

        // Absent key and absent value are no-ops.
        smap.remove(&1, &20);
        smap.remove(&2, &99);
        assert_eq!(smap.count(), 1);
    }

    #[test]
    fn test_slicemap_remove_key() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 10);
        smap.insert(1, 20);

        smap.remove_key(&1);
        assert_eq!(smap.get(&1), None);
        assert!(smap.is_empty());

        // Absent key is a no-op, not an error.
        smap.remove_key(&3);
        assert_eq!(smap.count(), 0);
    }

    #[test]
    fn test_slicemap_insert_batch() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert_batch(1, vec![5, 3, 8]);
        assert_eq!(smap.get(&1), Some(vec![3, 5, 8]));

        smap.insert_batch(1, vec![3, 7, 2, 2]);
        assert_eq!(smap.get(&1), Some(vec![2, 3, 5, 7, 8]));

        smap.insert_batch(2, vec![22, 6, 1]);
        assert_eq!(smap.get(&2), Some(vec![1, 6, 22]));

        // An empty batch never materialises an empty sequence.
        smap.insert_batch(3, vec![]);
        assert_eq!(smap.get(&3), None);
        assert_eq!(smap.len(), 2);
    }

    #[test]
    fn test_slicemap_get_no_alias() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 10);

        let mut snapshot = smap.get(&1).unwrap();
        snapshot.push(99);
        assert_eq!(smap.get(&1), Some(vec![10]));

        let before = smap.get(&1).unwrap();
        smap.insert(1, 20);
        assert_eq!(before, vec![10]);
        assert_eq!(smap.get(&1), Some(vec![10, 20]));
    }

    #[test]
    fn test_slicemap_for_each_value() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 20);
        smap.insert(1, 10);
        smap.insert(2, 30);

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        smap.for_each_value(|k, v| {
            pairs.push((*k, *v));
            true
        });
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(1, 10), (1, 20), (2, 30)]);

        // Early stop terminates the pass.
        let mut seen = 0;
        smap.for_each_value(|_, _| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_slicemap_for_each_key() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert(1, 10);
        smap.insert(2, 20);
        smap.insert(2, 30);

        let mut keys: Vec<usize> = Vec::new();
        smap.for_each_key(|k| {
            keys.push(*k);
            true
        });
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2]);

        let mut seen = 0;
        smap.for_each_key(|_| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);

        // A key removed by emptying its sequence no longer appears.
        smap.remove(&1, &10);
        let mut keys: Vec<usize> = Vec::new();
        smap.for_each_key(|k| {
            keys.push(*k);
            true
        });
        assert_eq!(keys, vec![2]);
    }

    #[test]
    fn test_slicemap_from_iter_extend() {
        let mut smap: SliceMap<usize, usize> =
            vec![(1, 20), (1, 10), (2, 30)].into_iter().collect();
        assert_eq!(smap.get(&1), Some(vec![10, 20]));
        assert_eq!(smap.get(&2), Some(vec![30]));

        smap.extend(vec![(2, 5), (3, 1)]);
        assert_eq!(smap.get(&2), Some(vec![5, 30]));
        assert_eq!(smap.get(&3), Some(vec![1]));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_slicemap_multithread_write_read() {
        use std::thread::scope;

        let _ = tracing_subscriber::fmt::try_init();

        const THREADS: usize = 4;
        const PER_THREAD: usize = 1000;

        let smap: SliceMap<usize, usize> = SliceMap::new();

        scope(|scope| {
            let smap_ref = &smap;

            let writers: Vec<_> = (0..THREADS)
                .map(|t| {
                    scope.spawn(move || {
                        for i in 0..PER_THREAD {
                            smap_ref.insert(i % 8, t * PER_THREAD + i);
                        }
                    })
                })
                .collect();

            let readers: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(move || {
                        for _ in 0..PER_THREAD {
                            if let Some(seq) = smap_ref.get(&3) {
                                // A reader must never observe a torn or
                                // out-of-order sequence.
                                assert!(seq.windows(2).all(|w| w[0] < w[1]));
                            }
                        }
                    })
                })
                .collect();

            for h in writers.into_iter() {
                h.join().unwrap();
            }
            for h in readers.into_iter() {
                h.join().unwrap();
            }
        });

        // Every write survived: no lost updates across threads.
        assert_eq!(smap.count(), THREADS * PER_THREAD);
        for t in 0..THREADS {
            for i in 0..PER_THREAD {
                assert!(smap.contains(&(i % 8), &(t * PER_THREAD + i)));
            }
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_slicemap_multithread_same_key_converge() {
        use std::thread::scope;

        let smap: SliceMap<usize, usize> = SliceMap::new();

        // Writers insert and remove disjoint value ranges under one key;
        // the survivors are exactly the values never removed.
        scope(|scope| {
            let smap_ref = &smap;
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    scope.spawn(move || {
                        let base = t * 100;
                        for i in 0..100 {
                            smap_ref.insert(7, base + i);
                        }
                        for i in 0..50 {
                            smap_ref.remove(&7, &(base + i));
                        }
                    })
                })
                .collect();
            for h in handles.into_iter() {
                h.join().unwrap();
            }
        });

        let seq = smap.get(&7).unwrap();
        assert!(seq.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seq.len(), 4 * 50);
        for t in 0..4usize {
            for i in 50..100 {
                assert!(smap.contains(&7, &(t * 100 + i)));
            }
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_slicemap_serialize_deserialize() {
        let smap: SliceMap<usize, usize> = SliceMap::new();
        smap.insert_batch(1, vec![20, 10]);
        smap.insert(2, 30);

        let value = serde_json::to_value(&smap).unwrap();
        assert_eq!(value, serde_json::json!({ "1": [10, 20], "2": [30] }));

        let smap: SliceMap<usize, usize> = serde_json::from_value(value).unwrap();
        assert_eq!(smap.get(&1), Some(vec![10, 20]));
        assert_eq!(smap.get(&2), Some(vec![30]));
        assert_eq!(smap.count(), 3);
    }
}
