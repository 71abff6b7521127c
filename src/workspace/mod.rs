//! The workspace root component.
//!
//! A [`Workspace`] owns the remote source, the revision cache, and the
//! provider registry, and exposes the calls the UI layer consumes:
//! directory resolution, content reads, and existence checks against
//! remote repository resources.

pub mod provider;
#[allow(clippy::module_inception)]
pub mod workspace;

pub use provider::WorkspaceProvider;
pub use workspace::{
    ResolveOptions, SearchQuery, Workspace, WorkspaceContext, WorkspaceError,
};
