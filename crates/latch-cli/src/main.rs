use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use latch_crypto::random_kdf_salt;
use latch_sync::{DirectoryTransport, LocalVaultStore};

mod cli_args;
mod modules;

use crate::cli_args::*;
use crate::modules::items::handle_item_command;
use crate::modules::sync::{handle_create, handle_logout, handle_status, handle_sync, handle_upgrade};
use crate::modules::system::{latch_dir, load_config, save_config, vault_dir, CommandContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let dir = latch_dir(cli.home.as_deref())?;
    let mut config = load_config(&dir)?;

    if let Command::Init(args) = &cli.command {
        let transport = DirectoryTransport::init(&args.server, &random_kdf_salt()).await?;
        config.server_dir = Some(std::fs::canonicalize(transport.root())?);
        save_config(&dir, &config)?;
        println!("server: {}", transport.root().display());
        return Ok(());
    }

    config.sync.apply_env_overrides();
    let store = Arc::new(LocalVaultStore::open(&vault_dir(&dir)).await?);
    let ctx = CommandContext {
        config,
        store,
        password: cli.password,
    };

    match cli.command {
        Command::Init(_) => {}
        Command::Create => handle_create(&ctx).await?,
        Command::Sync => handle_sync(&ctx).await?,
        Command::Status(args) => handle_status(&ctx, args).await?,
        Command::Upgrade => handle_upgrade(&ctx).await?,
        Command::Logout => handle_logout(&ctx).await?,
        command => handle_item_command(command, &ctx).await?,
    }
    Ok(())
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
