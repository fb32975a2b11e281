use serde_json::json;

use latch_sync::{SyncOutcome, VaultSession};

use crate::cli_args::StatusArgs;
use crate::modules::system::CommandContext;

pub(crate) async fn handle_create(ctx: &CommandContext) -> anyhow::Result<()> {
    if ctx.store.has_vault().await {
        anyhow::bail!("a vault already exists on this device");
    }
    ctx.unlock().await?;
    VaultSession::create(ctx.store.clone(), ctx.cipher())
        .await?
        .close()
        .await;
    println!("vault created");
    Ok(())
}

pub(crate) async fn handle_sync(ctx: &CommandContext) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let outcome = engine.request_sync().await?;
    println!("{}", describe(&outcome));
    Ok(())
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::NoChanges => "up to date".to_string(),
        SyncOutcome::Uploaded { revision } => format!("uploaded revision {revision}"),
        SyncOutcome::Downloaded { revision } => format!("downloaded revision {revision}"),
        SyncOutcome::Merged { revision, stats } => format!(
            "merged revision {revision} ({} conflicts, {} from server, {} local)",
            stats.conflicts, stats.records_from_server, stats.records_created_locally
        ),
        SyncOutcome::Offline => "offline, local changes kept".to_string(),
        SyncOutcome::Recovered { revision, reason } => format!(
            "adopted revision {revision}, local vault kept as recovery copy ({reason})"
        ),
        SyncOutcome::UpgradeRequired { schema } => {
            format!("vault uses schema {schema}, run `latch upgrade`")
        }
        SyncOutcome::Coalesced => "sync already running".to_string(),
    }
}

pub(crate) async fn handle_status(ctx: &CommandContext, args: StatusArgs) -> anyhow::Result<()> {
    let metadata = ctx.store.metadata().await;
    let has_vault = ctx.store.has_vault().await;
    let has_recovery_copy = ctx.store.get_recovery_blob().await.is_some();
    if args.json {
        let body = json!({
            "hasVault": has_vault,
            "hasRecoveryCopy": has_recovery_copy,
            "isDirty": metadata.is_dirty,
            "isOffline": metadata.is_offline,
            "mutationSequence": metadata.mutation_sequence,
            "serverRevision": metadata.server_revision,
            "serverDir": ctx.config.server_dir,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    println!("vault: {}", if has_vault { "present" } else { "none" });
    println!("dirty: {}", metadata.is_dirty);
    println!("offline: {}", metadata.is_offline);
    println!("mutation sequence: {}", metadata.mutation_sequence);
    println!("server revision: {}", metadata.server_revision);
    if has_recovery_copy {
        println!("recovery copy: present");
    }
    Ok(())
}

pub(crate) async fn handle_upgrade(ctx: &CommandContext) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let schema = engine.upgrade_local_vault().await?;
    println!("vault at schema {schema}");
    Ok(())
}

pub(crate) async fn handle_logout(ctx: &CommandContext) -> anyhow::Result<()> {
    ctx.store.logout().await?;
    println!("logged out");
    Ok(())
}
