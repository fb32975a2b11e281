use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::{FieldHistory, FieldRef, ServiceError, ServiceResult, MAX_FIELD_HISTORY};

use crate::local::FieldHistoryRepo;

use super::db_error;

/// Appends the previous value set of a field and prunes the oldest rows
/// beyond `MAX_FIELD_HISTORY`.
pub(super) async fn record_field_history(
    conn: &mut SqliteConnection,
    item_id: Uuid,
    field: &FieldRef,
    previous: &[String],
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    let value_snapshot = serde_json::to_string(previous)
        .map_err(|err| ServiceError::new("history_encode_failed", err.to_string()))?;
    let row = FieldHistory {
        id: Uuid::now_v7(),
        item_id,
        field: field.clone(),
        value_snapshot,
        changed_at: at,
        created_at: at,
        updated_at: at,
        is_deleted: false,
    };
    let mut repo = FieldHistoryRepo::new(conn);
    repo.insert(&row).await.map_err(db_error)?;

    let mut order = repo
        .list_order_keys(item_id, field)
        .await
        .map_err(db_error)?;
    order.sort_by(|a, b| {
        b.changed_at
            .cmp(&a.changed_at)
            .then_with(|| b.seq.cmp(&a.seq))
    });
    let stale: Vec<Uuid> = order
        .iter()
        .skip(MAX_FIELD_HISTORY)
        .map(|key| key.id)
        .collect();
    for id in &stale {
        repo.soft_delete(*id, at).await.map_err(db_error)?;
    }
    tracing::debug!(
        event = "field_history_recorded",
        item_id = %item_id,
        field = %field,
        pruned = stale.len()
    );
    Ok(())
}
