use std::io::Write;

use clap::Args;

use crate::cli::Result;
use crate::workspace::Workspace;

/// Arguments for the `cat` command.
#[derive(Args, Debug)]
pub struct CatArgs {
    /// The file resource identifier to print.
    pub uri: String,
}

pub async fn run(workspace: &Workspace, args: &CatArgs) -> Result<()> {
    let content = workspace.read(&args.uri).await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;
    Ok(())
}
