//! Revision references and revision-aware caching.
//!
//! A revision is a pointer to a state of a repository: symbolic and mutable
//! (a branch name) or immutable (a commit id). The [`RevisionCache`] resolves
//! resources to revisions and memoizes flat file listings and file contents
//! keyed by immutable identity tuples, so every resource reference stays
//! reproducible for the lifetime of the process.

pub mod cache;
pub mod types;

pub use cache::{RevisionCache, RevisionError};
pub use types::RevisionRef;
