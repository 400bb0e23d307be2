//! Longest common extension (LCE) query index.
//!
//! Two independent structures answer `lce(i, j)` over an immutable text T:
//!
//! - [`sss_index::SssIndex`] — a string-synchronizing-set index: a sparse
//!   set S of "anchor" positions, a bounded suffix sort over S, and an RMQ
//!   over the resulting LCP array, with a successor index to map an
//!   arbitrary query position to its nearest anchor. O(n) space, O(log n)
//!   query.
//! - [`prezza::PrezzaIndex`] — an in-place Rabin-Karp index that overwrites
//!   T with prefix-fingerprint blocks and answers queries by exponential
//!   and binary search over fingerprint comparisons alone.

pub mod bitpacked;
pub mod cancel;
pub mod error;
pub mod mersenne61;
pub mod prezza;
pub mod rolling_hash;
pub mod sss;
pub mod sss_index;
pub mod successor;
pub mod suffix_sort;

pub use cancel::CancelToken;
pub use error::{BuildError, BuildResult, QueryError, QueryResult};
pub use prezza::{build_prezza_index, PrezzaIndex};
pub use sss_index::{build_sss_index, SssIndex};
