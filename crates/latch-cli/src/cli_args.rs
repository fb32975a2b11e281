use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

pub use crate::modules::items::args::*;
pub use crate::modules::sync::args::*;
pub use crate::modules::system::args::*;

#[derive(Parser)]
#[command(name = "latch")]
#[command(about = "Latch vault CLI")]
pub struct Cli {
    /// Directory holding `.latch/`; defaults to $HOME.
    #[arg(long, env = "LATCH_HOME")]
    pub home: Option<PathBuf>,
    /// Master password; only commands that open the vault need it.
    #[arg(long, env = "LATCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(about = "Point this device at a server directory")]
    Init(InitArgs),
    #[command(about = "Create an empty vault on this device")]
    Create,
    Add(AddArgs),
    Edit(EditArgs),
    List(ListArgs),
    Show(ItemIdArgs),
    Trash(ItemIdArgs),
    Restore(ItemIdArgs),
    #[command(about = "Permanently delete an item")]
    Delete(ItemIdArgs),
    #[command(about = "Delete trashed items past the retention window")]
    Purge,
    History(HistoryArgs),
    Sync,
    Status(StatusArgs),
    #[command(about = "Migrate the local vault to the newest schema")]
    Upgrade,
    Logout,
}
