/// A reference to a repository revision.
///
/// `specifier` is the disambiguated symbolic pointer (a branch or tag name),
/// `raw_specifier` the original user input before disambiguation, and `id`
/// the immutable content address once resolved. When `id` is present it is
/// preferred over the specifier everywhere, for reproducibility.
///
/// A `RevisionRef` is superseded rather than mutated: a revision change
/// builds a new value and the old one is discarded only after the new one
/// has resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionRef {
    /// The symbolic pointer, e.g. a branch name.
    pub specifier: Option<String>,
    /// The original user input before disambiguation.
    pub raw_specifier: Option<String>,
    /// The immutable content address, e.g. a commit hash.
    pub id: Option<String>,
}

impl RevisionRef {
    /// A reference carrying a user-supplied specifier, not yet resolved.
    pub fn from_specifier(raw: &str) -> RevisionRef {
        RevisionRef {
            specifier: Some(raw.to_string()),
            raw_specifier: Some(raw.to_string()),
            id: None,
        }
    }

    /// A reference pinned to an immutable id.
    pub fn pinned(id: &str) -> RevisionRef {
        RevisionRef {
            specifier: None,
            raw_specifier: None,
            id: Some(id.to_string()),
        }
    }

    /// This reference with its id filled in after resolution.
    pub fn with_id(&self, id: &str) -> RevisionRef {
        RevisionRef {
            specifier: self.specifier.clone(),
            raw_specifier: self.raw_specifier.clone(),
            id: Some(id.to_string()),
        }
    }

    /// Whether the reference carries an immutable id.
    pub fn is_pinned(&self) -> bool {
        self.id.is_some()
    }

    /// The revision string to use for resolution and display: the id when
    /// present, the specifier otherwise.
    pub fn effective(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.specifier.as_deref())
            .or(self.raw_specifier.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_prefers_id() {
        let rev = RevisionRef::from_specifier("main").with_id("c0ffee");
        assert_eq!(rev.effective(), Some("c0ffee"));
        assert_eq!(rev.specifier.as_deref(), Some("main"));
    }

    #[test]
    fn test_specifier_used_until_resolved() {
        let rev = RevisionRef::from_specifier("main");
        assert!(!rev.is_pinned());
        assert_eq!(rev.effective(), Some("main"));
    }

    #[test]
    fn test_empty_reference_has_no_effective_revision() {
        assert_eq!(RevisionRef::default().effective(), None);
    }
}
