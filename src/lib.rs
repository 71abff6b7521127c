//! revfs-rs - browse remote revision-versioned repositories as a virtual
//! directory tree, without cloning.

pub mod cli;
pub mod config;
pub mod locator;
pub mod query_cache;
pub mod remote;
pub mod revision;
pub mod scm;
pub mod tree;
pub mod util;
pub mod workspace;

pub use locator::{AddressingError, RepoUri, ResourceInfo};

pub use query_cache::{SwrCache, SwrHit};

pub use revision::{RevisionCache, RevisionError, RevisionRef};

pub use tree::{materialize, FileStatNode, MaterializeOptions, TreeError};

pub use workspace::{ResolveOptions, Workspace, WorkspaceContext, WorkspaceError};
