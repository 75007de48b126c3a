//! The interchangeable construction strategies.
//!
//! All three share the same input contract (partition reader, histogram,
//! effective text) and differ in how the bits come into existence:
//! domain decomposition and the parallel split produce node-keyed vectors
//! that a merge rebalances afterwards, while the bucket strategy emits
//! level-keyed vectors directly.

pub mod bucket;
pub mod domain_decomp;
pub mod parallel_split;
