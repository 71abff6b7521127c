use crate::locator::{AddressingError, RepoUri};
use crate::remote::{DiffEntry, DiffStatus};

/// One changed resource in a diff, paired for before/after display.
///
/// `resource` addresses the file at the head revision and `original` at the
/// base revision; the status decides which sides exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResource {
    /// The change kind, used for decoration.
    pub status: DiffStatus,
    /// The resource at the head revision; absent for deletions.
    pub resource: Option<RepoUri>,
    /// The resource at the base revision; absent for additions.
    pub original: Option<RepoUri>,
}

/// The single resource group a provider exposes for its current diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    /// Stable group identifier.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// The changed resources, in the order the remote reported them.
    pub resources: Vec<DiffResource>,
}

/// Build the resource group for a diff between two resolved revisions.
pub fn build_resource_group(
    repository: &str,
    base_id: &str,
    head_id: &str,
    entries: &[DiffEntry],
) -> Result<ResourceGroup, AddressingError> {
    let base_root = RepoUri::for_repository(repository, Some(base_id))?;
    let head_root = RepoUri::for_repository(repository, Some(head_id))?;

    let resources = entries
        .iter()
        .map(|entry| pair_resources(entry, &base_root, &head_root))
        .collect();

    Ok(ResourceGroup {
        id: "revision-diff".to_string(),
        label: format!("Changes {}..{}", short_id(base_id), short_id(head_id)),
        resources,
    })
}

/// Select the before/after resources for one diff entry by its status.
fn pair_resources(entry: &DiffEntry, base_root: &RepoUri, head_root: &RepoUri) -> DiffResource {
    let original_path = entry.original_path.as_deref().unwrap_or(&entry.path);
    let (resource, original) = match entry.status {
        DiffStatus::Added => (Some(head_root.join(&entry.path)), None),
        DiffStatus::Deleted => (None, Some(base_root.join(original_path))),
        DiffStatus::Renamed | DiffStatus::Copied => (
            Some(head_root.join(&entry.path)),
            Some(base_root.join(original_path)),
        ),
        DiffStatus::Modified | DiffStatus::Unknown => (
            Some(head_root.join(&entry.path)),
            Some(base_root.join(&entry.path)),
        ),
    };
    DiffResource {
        status: entry.status,
        resource,
        original,
    }
}

fn short_id(id: &str) -> &str {
    if id.len() > 8 {
        &id[..8]
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "h.io/acme/widget";

    fn entry(status: DiffStatus, path: &str, original: Option<&str>) -> DiffEntry {
        DiffEntry {
            status,
            path: path.to_string(),
            original_path: original.map(str::to_string),
        }
    }

    #[test]
    fn test_pairing_by_status() {
        let entries = vec![
            entry(DiffStatus::Added, "new.rs", None),
            entry(DiffStatus::Deleted, "gone.rs", None),
            entry(DiffStatus::Modified, "same.rs", None),
            entry(DiffStatus::Renamed, "after.rs", Some("before.rs")),
        ];
        let group = build_resource_group(REPO, "base1", "head1", &entries).unwrap();
        assert_eq!(group.resources.len(), 4);

        let added = &group.resources[0];
        assert!(added.original.is_none());
        assert_eq!(
            added.resource.as_ref().unwrap().to_string(),
            "repo+version://h.io/acme/widget/new.rs?head1"
        );

        let deleted = &group.resources[1];
        assert!(deleted.resource.is_none());
        assert_eq!(
            deleted.original.as_ref().unwrap().to_string(),
            "repo+version://h.io/acme/widget/gone.rs?base1"
        );

        let modified = &group.resources[2];
        assert_eq!(
            modified.resource.as_ref().unwrap().relative_path(),
            "same.rs"
        );
        assert_eq!(
            modified.original.as_ref().unwrap().relative_path(),
            "same.rs"
        );

        let renamed = &group.resources[3];
        assert_eq!(
            renamed.resource.as_ref().unwrap().relative_path(),
            "after.rs"
        );
        assert_eq!(
            renamed.original.as_ref().unwrap().relative_path(),
            "before.rs"
        );
        assert_eq!(
            renamed.original.as_ref().unwrap().revision(),
            Some("base1")
        );
    }

    #[test]
    fn test_label_shortens_long_ids() {
        let group =
            build_resource_group(REPO, "0123456789abcdef", "fedcba9876543210", &[]).unwrap();
        assert_eq!(group.label, "Changes 01234567..fedcba98");
    }
}
