//! Configuration loading and types.
//!
//! Configuration comes from an INI file with layered overrides: a main
//! file, an optional overrides file, and `section.key=value` overrides
//! (typically from the command line), applied in that order.

mod read_config;
mod types;

pub use read_config::{parse_override, read_config, ConfigError, ConfigSource};
pub use types::{CacheSettings, Config, RemoteConfig, WorkspaceSettings};
