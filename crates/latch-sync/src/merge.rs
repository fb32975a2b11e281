//! Record-level last-write-wins merge of two vault images.
//!
//! Every table is merged independently by row id, parents before dependents.
//! A row present on one side only is copied. A row present on both sides
//! resolves by `updated_at`, then by how final its state is, then by content
//! digest, so the result never depends on which side is called "local".

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use latch_core::{record_digest, ParentRef, RecordSet, SyncRecord, VaultSnapshot};
use latch_db::{ImageError, VaultDatabase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MergeStats {
    pub records_created_locally: usize,
    pub records_from_server: usize,
    pub records_from_local: usize,
    pub conflicts: usize,
    pub tables_processed: usize,
    pub records_unchanged: usize,
    pub orphans_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Plaintext SQLite image of the merged vault.
    pub blob: Vec<u8>,
    pub snapshot: VaultSnapshot,
    pub stats: MergeStats,
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("schema revisions differ: local {local}, server {server}")]
    SchemaMismatch { local: i64, server: i64 },
    #[error("vault image could not be read or written: {0}")]
    Image(#[from] ImageError),
    #[error("row {id} in {table} could not be encoded: {source}")]
    Encode {
        table: &'static str,
        id: Uuid,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    Same,
    Local,
    Server,
}

fn pick<T: SyncRecord>(local: &T, server: &T) -> Result<Pick, MergeError> {
    if local == server {
        return Ok(Pick::Same);
    }
    let by_time = local.updated_at().cmp(&server.updated_at());
    let by_state = || local.state().cmp(&server.state());
    let ordering = match by_time {
        Ordering::Equal => match by_state() {
            Ordering::Equal => digest(local)?.cmp(&digest(server)?),
            other => other,
        },
        other => other,
    };
    Ok(match ordering {
        Ordering::Less => Pick::Server,
        _ => Pick::Local,
    })
}

fn digest<T: SyncRecord>(record: &T) -> Result<[u8; 32], MergeError> {
    record_digest(record).map_err(|source| MergeError::Encode {
        table: T::TABLE,
        id: record.id(),
        source,
    })
}

fn merge_table<T: SyncRecord>(
    local: &RecordSet<T>,
    server: &RecordSet<T>,
    stats: &mut MergeStats,
) -> Result<RecordSet<T>, MergeError> {
    stats.tables_processed += 1;
    let mut merged = RecordSet::new();
    for (id, local_row) in local {
        let Some(server_row) = server.get(id) else {
            stats.records_created_locally += 1;
            merged.insert(*id, local_row.clone());
            continue;
        };
        let chosen = match pick(local_row, server_row)? {
            Pick::Same => {
                stats.records_unchanged += 1;
                local_row
            }
            Pick::Local => {
                stats.records_from_local += 1;
                if local_row.updated_at() == server_row.updated_at() {
                    stats.conflicts += 1;
                }
                local_row
            }
            Pick::Server => {
                stats.records_from_server += 1;
                stats.conflicts += 1;
                server_row
            }
        };
        merged.insert(*id, chosen.clone());
    }
    for (id, server_row) in server {
        if !local.contains_key(id) {
            stats.records_from_server += 1;
            merged.insert(*id, server_row.clone());
        }
    }
    tracing::trace!(
        event = "merge_table",
        table = T::TABLE,
        rows = merged.len()
    );
    Ok(merged)
}

/// Ids a dependent row may point at after the parent tables are merged.
struct Survivors {
    items: BTreeSet<Uuid>,
    field_definitions: BTreeSet<Uuid>,
    tags: BTreeSet<Uuid>,
}

impl Survivors {
    fn keeps(&self, parent: &ParentRef) -> bool {
        match parent {
            ParentRef::Item(id) => self.items.contains(id),
            ParentRef::FieldDefinition(id) => self.field_definitions.contains(id),
            ParentRef::Tag(id) => self.tags.contains(id),
        }
    }
}

fn drop_orphans<T: SyncRecord>(
    rows: &mut RecordSet<T>,
    survivors: &Survivors,
    stats: &mut MergeStats,
) {
    let before = rows.len();
    rows.retain(|_, row| row.parents().iter().all(|parent| survivors.keeps(parent)));
    let dropped = before - rows.len();
    if dropped > 0 {
        tracing::debug!(event = "merge_orphans_dropped", table = T::TABLE, dropped);
    }
    stats.orphans_dropped += dropped;
}

/// Merges two snapshots of the same schema revision.
pub fn merge_snapshots(
    local: &VaultSnapshot,
    server: &VaultSnapshot,
) -> Result<(VaultSnapshot, MergeStats), MergeError> {
    if local.schema_revision != server.schema_revision {
        return Err(MergeError::SchemaMismatch {
            local: local.schema_revision,
            server: server.schema_revision,
        });
    }
    let mut stats = MergeStats::default();
    let mut merged = VaultSnapshot::empty(local.schema_revision);

    merged.folders = merge_table(&local.folders, &server.folders, &mut stats)?;
    merged.logos = merge_table(&local.logos, &server.logos, &mut stats)?;
    merged.field_definitions =
        merge_table(&local.field_definitions, &server.field_definitions, &mut stats)?;
    merged.tags = merge_table(&local.tags, &server.tags, &mut stats)?;
    merged.items = merge_table(&local.items, &server.items, &mut stats)?;

    for item in merged.items.values_mut() {
        if item
            .folder_id
            .is_some_and(|id| !merged.folders.get(&id).is_some_and(|f| !f.is_deleted))
        {
            item.folder_id = None;
        }
        if item
            .logo_id
            .is_some_and(|id| !merged.logos.get(&id).is_some_and(|l| !l.is_deleted))
        {
            item.logo_id = None;
        }
    }

    let survivors = Survivors {
        items: merged
            .items
            .values()
            .filter(|item| !item.is_tombstone())
            .map(|item| item.id)
            .collect(),
        field_definitions: merged.field_definitions.keys().copied().collect(),
        tags: merged.tags.keys().copied().collect(),
    };

    merged.field_values = merge_table(&local.field_values, &server.field_values, &mut stats)?;
    drop_orphans(&mut merged.field_values, &survivors, &mut stats);
    merged.field_history = merge_table(&local.field_history, &server.field_history, &mut stats)?;
    drop_orphans(&mut merged.field_history, &survivors, &mut stats);
    merged.passkeys = merge_table(&local.passkeys, &server.passkeys, &mut stats)?;
    drop_orphans(&mut merged.passkeys, &survivors, &mut stats);
    merged.totp_codes = merge_table(&local.totp_codes, &server.totp_codes, &mut stats)?;
    drop_orphans(&mut merged.totp_codes, &survivors, &mut stats);
    merged.attachments = merge_table(&local.attachments, &server.attachments, &mut stats)?;
    drop_orphans(&mut merged.attachments, &survivors, &mut stats);
    merged.item_tags = merge_table(&local.item_tags, &server.item_tags, &mut stats)?;
    drop_orphans(&mut merged.item_tags, &survivors, &mut stats);

    Ok((merged, stats))
}

async fn load_image(bytes: &[u8]) -> Result<VaultSnapshot, MergeError> {
    let database = VaultDatabase::open_image(bytes).await?;
    let snapshot = database.load_snapshot().await;
    database.close().await;
    Ok(snapshot?)
}

/// Merges two plaintext vault images into a new one.
pub async fn merge_vaults(local: &[u8], server: &[u8]) -> Result<MergeResult, MergeError> {
    let local_snapshot = load_image(local).await?;
    let server_snapshot = load_image(server).await?;
    let (snapshot, stats) = merge_snapshots(&local_snapshot, &server_snapshot)?;

    let database = VaultDatabase::from_snapshot(&snapshot).await?;
    let blob = database.export_image().await;
    database.close().await;
    let blob = blob?;
    tracing::info!(
        event = "vault_merged",
        created_locally = stats.records_created_locally,
        from_server = stats.records_from_server,
        from_local = stats.records_from_local,
        conflicts = stats.conflicts,
        unchanged = stats.records_unchanged,
        orphans = stats.orphans_dropped
    );
    Ok(MergeResult {
        blob,
        snapshot,
        stats,
    })
}
