//! SortedVec - a strictly increasing, duplicate-free sequence of values.
//!
//! This is the per-key storage of the `SliceMap`. It maintains the ordering
//! invariant on every mutation but knows nothing about locking - the public
//! map type wraps it in the reader/writer discipline.

use smallvec::SmallVec;
use std::cmp::Ordering;
use std::mem;

// Most keys hold a handful of values, so keep short sequences inline.
type Inner<V> = SmallVec<[V; 8]>;

/// A dynamically sized sequence of values kept sorted and free of
/// duplicates. For all adjacent elements, `a[i] < a[i + 1]`.
///
/// Single-element operations fast-path against the endpoints before falling
/// back to a binary search, so sequential or reverse-sequential workloads
/// never pay the search cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedVec<V>
where
    V: Ord,
{
    data: Inner<V>,
}

impl<V: Ord> Default for SortedVec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Ord> SortedVec<V> {
    /// Construct an empty sequence.
    pub fn new() -> Self {
        SortedVec {
            data: SmallVec::new(),
        }
    }

    /// Construct a single-element sequence.
    pub fn with_value(value: V) -> Self {
        let mut data = Inner::new();
        data.push(value);
        SortedVec { data }
    }

    /// Construct a sequence from unsorted, possibly duplicated input. The
    /// input is sorted and deduplicated; no ordering is assumed of it.
    pub fn from_unsorted(mut values: Vec<V>) -> Self {
        values.sort_unstable();
        values.dedup();
        SortedVec {
            data: Inner::from_vec(values),
        }
    }

    /// The number of values in the sequence.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the sequence holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate the values in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.data.iter()
    }

    /// View the sequence as a sorted slice.
    pub fn as_slice(&self) -> &[V] {
        self.data.as_slice()
    }

    /// Copy the sequence out as an owned, sorted `Vec`.
    pub fn to_vec(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.data.to_vec()
    }

    /// Insert `value`, keeping the sequence sorted. Returns true if the
    /// value was inserted, false if it was already present.
    pub fn insert(&mut self, value: V) -> bool {
        if self.data.is_empty() {
            self.data.push(value);
            return true;
        }
        let last = self.data.len() - 1;
        if value < self.data[0] {
            self.data.insert(0, value);
            return true;
        }
        if value > self.data[last] {
            self.data.push(value);
            return true;
        }
        if value == self.data[0] || value == self.data[last] {
            return false;
        }
        match self.data.binary_search(&value) {
            Ok(_) => false,
            Err(idx) => {
                self.data.insert(idx, value);
                true
            }
        }
    }

    /// Remove `value` if present. Returns true if a value was removed.
    /// Removing an absent value is a no-op.
    pub fn remove(&mut self, value: &V) -> bool {
        if self.data.is_empty() {
            return false;
        }
        let last = self.data.len() - 1;
        if *value == self.data[0] {
            self.data.remove(0);
            return true;
        }
        if *value == self.data[last] {
            self.data.pop();
            return true;
        }
        // Outside the endpoints it can not be present at all.
        if *value < self.data[0] || *value > self.data[last] {
            return false;
        }
        match self.data.binary_search(value) {
            Ok(idx) => {
                self.data.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// True if `value` is present in the sequence.
    pub fn contains(&self, value: &V) -> bool {
        match (self.data.first(), self.data.last()) {
            (Some(first), Some(last)) if value >= first && value <= last => {
                self.data.binary_search(value).is_ok()
            }
            _ => false,
        }
    }

    /// Merge another sorted sequence into this one, folding values present
    /// on both sides into a single occurrence. A simultaneous forward scan
    /// over both inputs, `O(n + m)`.
    pub fn merge(&mut self, other: SortedVec<V>) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        let mut merged = Inner::with_capacity(self.data.len() + other.data.len());
        let mut a = mem::take(&mut self.data).into_iter();
        let mut b = other.data.into_iter();
        let mut head_a = a.next();
        let mut head_b = b.next();
        loop {
            match (head_a.take(), head_b.take()) {
                (Some(x), Some(y)) => match x.cmp(&y) {
                    Ordering::Less => {
                        merged.push(x);
                        head_a = a.next();
                        head_b = Some(y);
                    }
                    Ordering::Greater => {
                        merged.push(y);
                        head_a = Some(x);
                        head_b = b.next();
                    }
                    Ordering::Equal => {
                        merged.push(x);
                        head_a = a.next();
                        head_b = b.next();
                    }
                },
                (Some(x), None) => {
                    // b exhausted, take the rest of a unchanged.
                    merged.push(x);
                    merged.extend(a);
                    break;
                }
                (None, Some(y)) => {
                    merged.push(y);
                    merged.extend(b);
                    break;
                }
                (None, None) => break,
            }
        }
        self.data = merged;
    }
}
