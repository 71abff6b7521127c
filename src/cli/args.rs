//! Command-line argument definitions and helpers.

use std::path::PathBuf;

use clap::Args;

use crate::config::{parse_override, ConfigSource};

/// Global arguments that apply to all commands.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the main configuration file.
    #[arg(long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Path to the configuration overrides file.
    #[arg(long = "config-file-overrides", global = true)]
    pub config_file_overrides: Option<PathBuf>,

    /// Configuration overrides in the form section.key=value.
    #[arg(long = "config", value_parser = parse_config_override, global = true)]
    pub config_overrides: Vec<(String, String)>,

    /// Remote endpoint, overriding the configured one.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Format output as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Convert to a ConfigSource for reading configuration.
    pub fn to_config_source(&self) -> ConfigSource {
        ConfigSource {
            config_file: self.config_file.clone(),
            override_file: self.config_file_overrides.clone(),
            overrides: self.config_overrides.clone(),
        }
    }
}

fn parse_config_override(arg: &str) -> Result<(String, String), String> {
    parse_override(arg).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_parsing() {
        assert_eq!(
            parse_config_override("remote.endpoint=http://x").unwrap(),
            ("remote.endpoint".to_string(), "http://x".to_string())
        );
        assert!(parse_config_override("bogus").is_err());
    }
}
