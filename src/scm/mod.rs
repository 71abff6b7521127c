//! Source-control providers and their registry.
//!
//! A [`Provider`] owns the revision and diff-base state for one repository
//! root. The [`ProviderRegistry`] maps resource paths back to the provider
//! responsible for them by longest-prefix match over registered roots.

pub mod diff;
pub mod provider;
pub mod registry;

pub use diff::{DiffResource, ResourceGroup};
pub use provider::{Provider, ProviderError, ProviderEvent, ProviderKind};
pub use registry::{ProviderHandle, ProviderRegistry, RegistryError};
