//! Stale-while-revalidate caching for repeatable queries.
//!
//! Search and listing operations are repeatable queries rather than direct
//! path lookups, so they go through a two-level cache: an outer namespace
//! key (letting a consumer invalidate a whole family of queries at once)
//! and an inner canonicalized query key. A stale hit is served immediately
//! while a refresh runs in the background, so switching back to a previous
//! query never blocks on a blank result.

pub mod cache;
pub mod canonical;

pub use cache::{QueryError, SwrCache, SwrHit};
pub use canonical::canonical_query_key;

/// The field of a serialized query that carries its cache namespace. It is
/// removed from the canonical form, since the namespace is the outer key.
pub const QUERY_NAMESPACE_FIELD: &str = "cache_key";
