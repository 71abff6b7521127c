use clap::Args;

use crate::cli::Result;
use crate::remote::RemoteSource;

/// Arguments for the `diff` command.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// The "authority/owner/name" repository identity.
    pub repository: String,

    /// The base revision specifier.
    pub base: String,

    /// The head revision specifier.
    pub head: String,
}

pub async fn run(remote: &dyn RemoteSource, args: &DiffArgs, json: bool) -> Result<()> {
    let base = remote.get_commit(&args.repository, &args.base).await?;
    let head = remote.get_commit(&args.repository, &args.head).await?;
    let entries = remote.get_diff(&args.repository, &base.id, &head.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &entries {
        match &entry.original_path {
            Some(original) => {
                println!("{}\t{} -> {}", entry.status.code(), original, entry.path)
            }
            None => println!("{}\t{}", entry.status.code(), entry.path),
        }
    }
    Ok(())
}
