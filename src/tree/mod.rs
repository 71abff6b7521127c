//! Directory tree materialization from flat path listings.
//!
//! A remote revision's file set arrives as a flat, lexicographically sorted
//! list of file paths with no directory entries. This module reconstructs a
//! navigable directory tree from that list: direct children become leaves or
//! directory nodes, and subdirectories are either expanded in the same pass
//! or emitted as unexpanded stubs for on-demand resolution later.

pub mod materialize;
pub mod node;

pub use materialize::{materialize, MaterializeOptions, TreeError};
pub use node::FileStatNode;
