use std::path::PathBuf;

use clap::Args;

#[derive(Args)]
pub struct InitArgs {
    /// Shared directory acting as the sync server.
    #[arg(long)]
    pub server: PathBuf,
}
