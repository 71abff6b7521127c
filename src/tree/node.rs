use crate::locator::RepoUri;

/// A node in a materialized directory tree.
///
/// Nodes are constructed fresh on every materialization and never mutated
/// afterwards; when the underlying listing changes the tree is rebuilt
/// wholesale. `children` being present implies `has_children`; a directory
/// with `has_children` and no `children` is an unexpanded stub awaiting
/// lazy resolution. A file node never has children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatNode {
    /// The resource identifier of this entry.
    pub resource: RepoUri,
    /// The entry's base name.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Whether the entry has any children.
    pub has_children: bool,
    /// The resolved children, when this level was expanded.
    pub children: Option<Vec<FileStatNode>>,
}

impl FileStatNode {
    /// A file leaf at `path` under the repository root.
    pub(crate) fn file(root: &RepoUri, path: &str, name: &str) -> FileStatNode {
        FileStatNode {
            resource: root.join(path),
            name: name.to_string(),
            is_directory: false,
            has_children: false,
            children: None,
        }
    }

    /// An unexpanded directory stub at `path` under the repository root.
    pub(crate) fn directory_stub(root: &RepoUri, path: &str, name: &str) -> FileStatNode {
        FileStatNode {
            resource: root.join(path),
            name: name.to_string(),
            is_directory: true,
            has_children: true,
            children: None,
        }
    }

    /// Whether this node is an unexpanded directory stub.
    pub fn is_stub(&self) -> bool {
        self.is_directory && self.has_children && self.children.is_none()
    }

    /// Find a resolved child by name.
    pub fn child(&self, name: &str) -> Option<&FileStatNode> {
        self.children
            .as_ref()
            .and_then(|children| children.iter().find(|c| c.name == name))
    }
}
