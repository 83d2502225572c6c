//! Slicemap - A concurrent map of sorted value sequences
//!
//! A [SliceMap](crate::slicemap::SliceMap) associates each key with a
//! strictly increasing, duplicate-free sequence of values. Membership tests,
//! single-value insertion and removal are all `O(log n)` over the sequence
//! touched, and a bulk path merges a whole batch of values into a key in
//! linear time.
//!
//! The map is guarded by a single reader/writer lock: any number of readers
//! may proceed in parallel, writers are exclusive. Reads never hand out
//! references into live storage - anything returned to a caller is an owned
//! copy taken inside the critical section, so no coordination with the
//! internal lock is ever required of the caller.
//!
//! Use this in place of a hand-rolled `RwLock<HashMap<K, Vec<V>>>` when you
//! need the per-key sequences kept sorted and unique under concurrent
//! mutation.
//!
//! # Features
//! * `foldhash` - use the foldhash crate for key hashing (default)
//! * `ahash` - use the cpu accelerated ahash crate instead
//! * `serde` - serialize/deserialize a point-in-time snapshot of the map

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]

pub mod internals;
#[cfg(feature = "serde")]
mod utils;

pub mod slicemap;
pub use slicemap::SliceMap;
