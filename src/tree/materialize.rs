use std::collections::BTreeSet;
use std::fmt;

use crate::locator::RepoUri;
use crate::tree::node::FileStatNode;

/// Error type for tree materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The listing names a path as both a file and a directory prefix.
    /// The listing endpoint must never produce this; treat as corrupt data.
    FileDirectoryConflict { path: String },
    /// No entry exists at the requested parent path.
    NotFound { path: String },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::FileDirectoryConflict { path } => {
                write!(f, "listing names '{}' as both a file and a directory", path)
            }
            TreeError::NotFound { path } => {
                write!(f, "listing has no entry at '{}'", path)
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Options controlling how deep a materialization pass expands.
#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    /// The path to materialize at; `None` or empty for the repository root.
    pub parent_path: Option<String>,
    /// Auto-expand subdirectories that have exactly one descendant, so
    /// single-entry directory chains resolve in one call.
    pub resolve_fully: bool,
    /// Paths to resolve deeply: every directory on the way to a member of
    /// this set is expanded rather than stubbed.
    pub resolve_exactly: BTreeSet<String>,
}

/// Reconstruct a directory tree node from a flat sorted listing.
///
/// `sorted_paths` must be lexicographically sorted and contain only file
/// paths; directories are inferred from common prefixes. The returned node
/// describes the entry at `options.parent_path` (the repository root when
/// absent): a leaf when the parent matches a literal listing entry, or a
/// directory whose children are files, expanded subtrees, or unexpanded
/// stubs depending on the expansion policies.
///
/// Pure and deterministic for a fixed `(sorted_paths, options)` pair;
/// performs no I/O.
pub fn materialize(
    root: &RepoUri,
    sorted_paths: &[String],
    options: &MaterializeOptions,
) -> Result<FileStatNode, TreeError> {
    let parent = options.parent_path.as_deref().unwrap_or("");
    build(root, sorted_paths, parent, options)
}

/// One recursive step: materialize the node at `parent`.
fn build(
    root: &RepoUri,
    paths: &[String],
    parent: &str,
    options: &MaterializeOptions,
) -> Result<FileStatNode, TreeError> {
    let prefix = child_prefix(parent);

    // A literal listing entry equal to the parent makes this node a file,
    // which must be decided before any directory walk is attempted.
    let is_literal_file =
        !parent.is_empty() && paths.binary_search_by(|p| p.as_str().cmp(parent)).is_ok();

    let start = paths.partition_point(|p| p.as_str() < prefix.as_str());
    let has_entries = paths.get(start).is_some_and(|p| p.starts_with(&prefix));

    if is_literal_file {
        if has_entries {
            return Err(TreeError::FileDirectoryConflict {
                path: parent.to_string(),
            });
        }
        return Ok(FileStatNode::file(root, parent, base_name(root, parent)));
    }
    if !has_entries && !parent.is_empty() {
        return Err(TreeError::NotFound {
            path: parent.to_string(),
        });
    }

    let mut children: Vec<FileStatNode> = Vec::new();
    let mut file_names: BTreeSet<&str> = BTreeSet::new();
    let mut i = start;

    // Sortedness guarantees all entries under `parent` are contiguous, so
    // the scan stops at the first non-matching entry.
    while i < paths.len() {
        let Some(rest) = paths[i].strip_prefix(prefix.as_str()) else {
            break;
        };
        match rest.split_once('/') {
            None => {
                let path = join_path(parent, rest);
                file_names.insert(rest);
                children.push(FileStatNode::file(root, &path, rest));
                i += 1;
            }
            Some((segment, _)) => {
                // A file child with this name sorts strictly earlier, so it
                // has already been recorded when the collision exists.
                if file_names.contains(segment) {
                    return Err(TreeError::FileDirectoryConflict {
                        path: join_path(parent, segment),
                    });
                }

                let child_path = join_path(parent, segment);
                let subtree_prefix = child_prefix(&child_path);
                let mut end = i + 1;
                while end < paths.len() && paths[end].starts_with(&subtree_prefix) {
                    end += 1;
                }

                let entry_count = end - i;
                if wants_deep_resolve(&options.resolve_exactly, &child_path)
                    || wants_single_chain(options.resolve_fully, entry_count)
                {
                    children.push(build(root, paths, &child_path, options)?);
                } else {
                    children.push(FileStatNode::directory_stub(root, &child_path, segment));
                }
                i = end;
            }
        }
    }

    let has_children = !children.is_empty();
    Ok(FileStatNode {
        resource: root.join(parent),
        name: base_name(root, parent).to_string(),
        is_directory: true,
        has_children,
        children: if has_children { Some(children) } else { None },
    })
}

/// Expansion policy: the caller asked for this subtree (or a descendant of
/// it) to be resolved deeply.
fn wants_deep_resolve(resolve_exactly: &BTreeSet<String>, path: &str) -> bool {
    resolve_exactly.iter().any(|target| {
        target == path
            || target
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Expansion policy: full resolution auto-expands subtrees with exactly one
/// descendant, collapsing single-child directory chains.
fn wants_single_chain(resolve_fully: bool, entry_count: usize) -> bool {
    resolve_fully && entry_count == 1
}

fn child_prefix(parent: &str) -> String {
    if parent.is_empty() {
        String::new()
    } else {
        format!("{parent}/")
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn base_name<'a>(root: &'a RepoUri, path: &'a str) -> &'a str {
    if path.is_empty() {
        root.segments().last().map(String::as_str).unwrap_or("")
    } else {
        path.rsplit('/').next().unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_root() -> RepoUri {
        RepoUri::for_repository("codehost.example/acme/widget", Some("abc123")).unwrap()
    }

    fn listing(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_root_with_lazy_stubs() {
        let paths = listing(&["a", "b/c", "b/d", "e/f/g"]);
        let node = materialize(&repo_root(), &paths, &MaterializeOptions::default()).unwrap();

        assert!(node.is_directory);
        assert_eq!(node.name, "widget");
        let children = node.children.as_ref().unwrap();
        assert_eq!(children.len(), 3);

        let a = node.child("a").unwrap();
        assert!(!a.is_directory);
        assert!(!a.has_children);

        let b = node.child("b").unwrap();
        assert!(b.is_stub());

        let e = node.child("e").unwrap();
        assert!(e.is_stub());
    }

    #[test]
    fn test_subtree_materialization() {
        let paths = listing(&["a", "b/c", "b/d", "e/f/g"]);
        let options = MaterializeOptions {
            parent_path: Some("b".to_string()),
            ..Default::default()
        };
        let node = materialize(&repo_root(), &paths, &options).unwrap();

        assert!(node.is_directory);
        assert_eq!(node.name, "b");
        let children = node.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| !c.is_directory));
        assert_eq!(children[0].name, "c");
        assert_eq!(children[1].name, "d");
    }

    #[test]
    fn test_resolve_fully_expands_single_child_chain() {
        let paths = listing(&["e/f/g"]);
        let options = MaterializeOptions {
            resolve_fully: true,
            ..Default::default()
        };
        let node = materialize(&repo_root(), &paths, &options).unwrap();

        let e = node.child("e").unwrap();
        assert!(e.is_directory);
        assert!(!e.is_stub());
        let f = e.child("f").unwrap();
        assert!(f.is_directory);
        assert!(!f.is_stub());
        let g = f.child("g").unwrap();
        assert!(!g.is_directory);
    }

    #[test]
    fn test_resolve_fully_leaves_wide_directories_stubbed() {
        let paths = listing(&["b/c", "b/d"]);
        let options = MaterializeOptions {
            resolve_fully: true,
            ..Default::default()
        };
        let node = materialize(&repo_root(), &paths, &options).unwrap();
        assert!(node.child("b").unwrap().is_stub());
    }

    #[test]
    fn test_resolve_exactly_expands_along_the_target() {
        let paths = listing(&["a", "b/c", "b/d", "e/f/g"]);
        let options = MaterializeOptions {
            resolve_exactly: BTreeSet::from(["e/f".to_string()]),
            ..Default::default()
        };
        let node = materialize(&repo_root(), &paths, &options).unwrap();

        assert!(node.child("b").unwrap().is_stub());
        let e = node.child("e").unwrap();
        assert!(!e.is_stub());
        let f = e.child("f").unwrap();
        assert!(!f.is_stub());
        assert!(!f.child("g").unwrap().is_directory);
    }

    #[test]
    fn test_file_directory_conflict_is_an_error() {
        let paths = listing(&["x", "x/y"]);
        let err = materialize(&repo_root(), &paths, &MaterializeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            TreeError::FileDirectoryConflict {
                path: "x".to_string()
            }
        );
    }

    #[test]
    fn test_conflict_detected_with_intervening_sibling() {
        // "x!a" sorts between "x" and "x/y"; the conflict must still be found.
        let paths = listing(&["x", "x!a", "x/y"]);
        let err = materialize(&repo_root(), &paths, &MaterializeOptions::default()).unwrap_err();
        assert!(matches!(err, TreeError::FileDirectoryConflict { .. }));
    }

    #[test]
    fn test_conflict_at_parent_path() {
        let paths = listing(&["x", "x/y"]);
        let options = MaterializeOptions {
            parent_path: Some("x".to_string()),
            ..Default::default()
        };
        let err = materialize(&repo_root(), &paths, &options).unwrap_err();
        assert!(matches!(err, TreeError::FileDirectoryConflict { .. }));
    }

    #[test]
    fn test_parent_matching_literal_entry_is_a_leaf() {
        let paths = listing(&["a", "b/c"]);
        let options = MaterializeOptions {
            parent_path: Some("a".to_string()),
            ..Default::default()
        };
        let node = materialize(&repo_root(), &paths, &options).unwrap();
        assert!(!node.is_directory);
        assert!(!node.has_children);
        assert_eq!(node.name, "a");
    }

    #[test]
    fn test_missing_parent_is_not_found() {
        let paths = listing(&["a", "b/c"]);
        let options = MaterializeOptions {
            parent_path: Some("missing".to_string()),
            ..Default::default()
        };
        let err = materialize(&repo_root(), &paths, &options).unwrap_err();
        assert_eq!(
            err,
            TreeError::NotFound {
                path: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_empty_listing_gives_empty_root() {
        let node = materialize(&repo_root(), &[], &MaterializeOptions::default()).unwrap();
        assert!(node.is_directory);
        assert!(!node.has_children);
        assert_eq!(node.children, None);
    }

    #[test]
    fn test_child_resources_address_into_the_repository() {
        let paths = listing(&["src/lib.rs"]);
        let node = materialize(&repo_root(), &paths, &MaterializeOptions::default()).unwrap();
        let src = node.child("src").unwrap();
        assert_eq!(
            src.resource.to_string(),
            "repo+version://codehost.example/acme/widget/src?abc123"
        );
    }

    #[test]
    fn test_deep_resolve_predicate() {
        let set = BTreeSet::from(["a/b/c".to_string()]);
        assert!(wants_deep_resolve(&set, "a"));
        assert!(wants_deep_resolve(&set, "a/b"));
        assert!(wants_deep_resolve(&set, "a/b/c"));
        assert!(!wants_deep_resolve(&set, "a/b/cd"));
        assert!(!wants_deep_resolve(&set, "b"));
    }

    #[test]
    fn test_single_chain_predicate() {
        assert!(wants_single_chain(true, 1));
        assert!(!wants_single_chain(true, 2));
        assert!(!wants_single_chain(false, 1));
    }
}
