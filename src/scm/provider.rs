use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};

use crate::locator::AddressingError;
use crate::remote::{RemoteError, RemoteSource};
use crate::revision::{RevisionCache, RevisionError, RevisionRef};
use crate::scm::diff::{build_resource_group, ResourceGroup};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// A revision operation is already in flight. Surfaced synchronously;
    /// never retried by the registry.
    PendingOperation,
    /// The provider's revision state is insufficient for the operation.
    Unresolved,
    /// Revision resolution or remote fetching failed.
    Revision(RevisionError),
    /// Resource identifier construction failed.
    Addressing(AddressingError),
    /// The operation is not supported by this provider.
    UnsupportedCommand(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::PendingOperation => {
                write!(f, "a revision operation is already pending")
            }
            ProviderError::Unresolved => {
                write!(f, "the provider's revision is not resolved")
            }
            ProviderError::Revision(e) => write!(f, "{}", e),
            ProviderError::Addressing(e) => write!(f, "{}", e),
            ProviderError::UnsupportedCommand(cmd) => {
                write!(f, "unsupported raw command: {}", cmd)
            }
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<RevisionError> for ProviderError {
    fn from(e: RevisionError) -> Self {
        ProviderError::Revision(e)
    }
}

impl From<AddressingError> for ProviderError {
    fn from(e: AddressingError) -> Self {
        ProviderError::Addressing(e)
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

// =============================================================================
// Provider
// =============================================================================

/// The kind of source control a provider speaks.
///
/// Call sites that only work with Git-style providers branch on this tag
/// instead of inspecting the concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Git,
    Other,
}

/// Change notifications a provider emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The revision changed, or a resolution attempt failed.
    RevisionChanged,
    /// The diff base and resource group were rebuilt.
    DiffBaseChanged,
}

/// Mutable provider state, superseded under the state lock.
struct ProviderState {
    revision: RevisionRef,
    last_resolve_failed: bool,
    diff_base: Option<RevisionRef>,
    diff_group: Option<ResourceGroup>,
}

/// The source-control provider for one repository root.
///
/// Revision changes are strictly serialized by a single-pending-update
/// guard: a `set_revision` arriving while another is resolving fails
/// immediately instead of queuing, so a slow older resolution can never
/// overwrite a newer result.
pub struct Provider {
    repository: String,
    kind: ProviderKind,
    revisions: Arc<RevisionCache>,
    remote: Arc<dyn RemoteSource>,
    state: Mutex<ProviderState>,
    resolving: watch::Sender<bool>,
    events: broadcast::Sender<ProviderEvent>,
}

impl Provider {
    /// Create a provider for `repository` with no revision set yet.
    pub fn new(
        repository: &str,
        kind: ProviderKind,
        revisions: Arc<RevisionCache>,
        remote: Arc<dyn RemoteSource>,
    ) -> Self {
        let (resolving, _) = watch::channel(false);
        let (events, _) = broadcast::channel(16);
        Self {
            repository: repository.to_string(),
            kind,
            revisions,
            remote,
            state: Mutex::new(ProviderState {
                revision: RevisionRef::default(),
                last_resolve_failed: false,
                diff_base: None,
                diff_group: None,
            }),
            resolving,
            events,
        }
    }

    /// The repository this provider owns.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The provider's source-control kind.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// The provider's current revision reference.
    pub fn current_revision(&self) -> RevisionRef {
        self.state.lock().unwrap().revision.clone()
    }

    /// Whether the most recent resolution attempt failed. The last-known-
    /// good revision stays in place when it did.
    pub fn last_resolution_failed(&self) -> bool {
        self.state.lock().unwrap().last_resolve_failed
    }

    /// The current diff base, if one was set.
    pub fn diff_base(&self) -> Option<RevisionRef> {
        self.state.lock().unwrap().diff_base.clone()
    }

    /// The resource group built from the current diff, if any.
    pub fn resource_group(&self) -> Option<ResourceGroup> {
        self.state.lock().unwrap().diff_group.clone()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    /// Change the provider's revision.
    ///
    /// Fails immediately with [`ProviderError::PendingOperation`] while a
    /// previous change is still resolving. On success the stored reference
    /// is replaced and a change notification fires only if the resolved
    /// value differs from the previous one. On resolution failure the
    /// previous reference stays, a sticky failure flag is set, and a change
    /// notification still fires so consumers can show the error state.
    pub async fn set_revision(&self, input: RevisionRef) -> Result<RevisionRef> {
        if self.resolving.send_replace(true) {
            return Err(ProviderError::PendingOperation);
        }
        let guard = ResolvingGuard {
            resolving: &self.resolving,
        };

        match self.resolve_input(&input).await {
            Ok(resolved) => {
                let changed = {
                    let mut state = self.state.lock().unwrap();
                    let changed = state.revision != resolved;
                    state.revision = resolved.clone();
                    state.last_resolve_failed = false;
                    changed
                };
                drop(guard);
                if changed {
                    tracing::debug!(
                        repository = self.repository.as_str(),
                        revision = resolved.effective().unwrap_or(""),
                        "revision changed"
                    );
                    let _ = self.events.send(ProviderEvent::RevisionChanged);
                }
                Ok(resolved)
            }
            Err(e) => {
                self.state.lock().unwrap().last_resolve_failed = true;
                drop(guard);
                tracing::warn!(
                    repository = self.repository.as_str(),
                    error = %e,
                    "revision resolution failed"
                );
                let _ = self.events.send(ProviderEvent::RevisionChanged);
                Err(e)
            }
        }
    }

    /// Completes once any in-flight resolution finishes, without starting
    /// one.
    pub async fn ready(&self) {
        let mut rx = self.resolving.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Change the diff base and rebuild the resource group.
    ///
    /// A request for the base already in effect (compared by raw specifier)
    /// is a no-op. Otherwise the call waits for any in-flight revision
    /// resolution, resolves the base, fetches the diff against the current
    /// revision, and replaces the single resource group.
    pub async fn set_diff_base(&self, input: RevisionRef) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if let Some(base) = &state.diff_base {
                if base.raw_specifier == input.raw_specifier {
                    return Ok(());
                }
            }
        }

        self.ready().await;

        let base = self.resolve_input(&input).await?;
        let head = self.current_revision();
        let base_id = base
            .effective()
            .ok_or(ProviderError::Unresolved)?
            .to_string();
        let head_id = head
            .effective()
            .ok_or(ProviderError::Unresolved)?
            .to_string();

        let entries = self
            .remote
            .get_diff(&self.repository, &base_id, &head_id)
            .await
            .map_err(|e| diff_fetch_error(e, &self.repository))?;
        let group = build_resource_group(&self.repository, &base_id, &head_id, &entries)?;

        {
            let mut state = self.state.lock().unwrap();
            state.diff_base = Some(base);
            state.diff_group = Some(group);
        }
        let _ = self.events.send(ProviderEvent::DiffBaseChanged);
        Ok(())
    }

    /// Resolve an input reference, skipping resolution when it already
    /// carries an immutable id.
    async fn resolve_input(&self, input: &RevisionRef) -> Result<RevisionRef> {
        if input.is_pinned() {
            return Ok(input.clone());
        }
        let id = self.revisions.pin(&self.repository, input).await?;
        Ok(input.with_id(&id))
    }
}

/// Map a remote failure while fetching a diff.
fn diff_fetch_error(e: RemoteError, repository: &str) -> ProviderError {
    match e {
        RemoteError::Unavailable => ProviderError::Revision(RevisionError::CloneInProgress {
            repository: repository.to_string(),
        }),
        other => ProviderError::Revision(RevisionError::Remote(other.to_string())),
    }
}

/// Returns the provider to *Idle* when dropped, whether resolution finished
/// or the call was cancelled mid-flight.
struct ResolvingGuard<'a> {
    resolving: &'a watch::Sender<bool>,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        // send_replace updates the value even with no active subscribers.
        self.resolving.send_replace(false);
    }
}
