//! Logarithmic Dynamic Cuckoo Filter: an approximate-set-membership
//! structure for variable-size string items that grows elastically beyond
//! the capacity of any single fixed-size cuckoo filter while keeping a
//! bounded false-positive rate.
//!
//! It is built for workloads where the final cardinality isn't known up
//! front and a false-negative-free guarantee on inserted items matters,
//! such as genomic k-mer screening or online deduplication.
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! ldcf = "0.1"
//! ```
//!
//! ```rust
//! use ldcf::LogarithmicDynamicCuckooFilter;
//!
//! let mut filter = LogarithmicDynamicCuckooFilter::new(0.01, 10_000, 4);
//!
//! filter.insert("AGCTTAGC");
//! assert!(filter.contains("AGCTTAGC"));
//!
//! filter.remove("AGCTTAGC");
//! assert!(!filter.contains("AGCTTAGC"));
//! ```
//!
//! A single [`CuckooFilter`] can also be used directly when elastic growth
//! isn't needed: it behaves like a conventional fixed-capacity cuckoo
//! filter with bit-packed fingerprints.

mod bucket;
mod error;
mod filter;
mod ldcf;
mod util;

pub use bucket::{Bucket, BUCKET_SIZE};
pub use error::LdcfError;
pub use filter::{CuckooFilter, Victim, LOAD_FACTOR, MAX_KICKS};
pub use ldcf::LogarithmicDynamicCuckooFilter;
