use clap::Args;

use crate::cli::Result;
use crate::workspace::{SearchQuery, Workspace};

/// Arguments for the `find` command.
#[derive(Args, Debug)]
pub struct FindArgs {
    /// The resource identifier to search under.
    pub uri: String,

    /// Substring to match against file paths.
    pub pattern: String,

    /// Maximum number of results (0 for unlimited).
    #[arg(long, default_value_t = 0)]
    pub max_results: u32,
}

pub async fn run(workspace: &Workspace, args: &FindArgs, json: bool) -> Result<()> {
    let query = SearchQuery {
        cache_key: "cli".to_string(),
        resource: args.uri.clone(),
        pattern: args.pattern.clone(),
        max_results: args.max_results,
    };
    let hit = workspace.search(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hit.value)?);
        return Ok(());
    }
    for path in &hit.value {
        println!("{}", path);
    }
    Ok(())
}
