//! Resource identifiers for remote repository resources.
//!
//! A resource identifier addresses a file or directory inside a remote,
//! revision-versioned repository using one of two custom schemes:
//!
//! - `repo://<authority>/<owner>/<name>/<path...>` - no revision; the active
//!   provider's current revision applies.
//! - `repo+version://<authority>/<owner>/<name>/<path...>?<revision>` - an
//!   explicit revision, percent-encoded in the query.

pub mod info;
pub mod uri;

pub use info::ResourceInfo;
pub use uri::{AddressingError, RepoScheme, RepoUri, REPOSITORY_SEGMENTS};
