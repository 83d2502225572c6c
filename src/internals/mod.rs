//! The internal building blocks of the concurrent structures. The types here
//! maintain their own invariants but perform no locking - the public modules
//! wrap them in the concurrency discipline.

pub mod svec;
