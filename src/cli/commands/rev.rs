use clap::Args;

use crate::cli::Result;
use crate::remote::RemoteSource;

/// Arguments for the `rev` command.
#[derive(Args, Debug)]
pub struct RevArgs {
    /// The "authority/owner/name" repository identity.
    pub repository: String,

    /// The revision specifier to resolve.
    pub specifier: String,
}

pub async fn run(remote: &dyn RemoteSource, args: &RevArgs, json: bool) -> Result<()> {
    let commit = remote.get_commit(&args.repository, &args.specifier).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&commit)?);
    } else {
        println!("{}", commit.id);
        if commit.clone_in_progress {
            eprintln!("note: repository is still being cloned; data may not be available yet");
        }
    }
    Ok(())
}
