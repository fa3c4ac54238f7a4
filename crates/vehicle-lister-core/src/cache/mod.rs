//! Per-brand chassis listing cache.
//!
//! A read-through/write-through layer in front of the local store: the chassis
//! listing of a brand is kept as a small JSON file keyed by the normalized brand
//! name. Entries expire after a TTL and are ignored when written by a different
//! cache version. The cache is an optimization only; the local store remains
//! authoritative.

pub mod manager;

pub use manager::{CachedData, ChassisSummaryCache, SUMMARY_CACHE_VERSION};
