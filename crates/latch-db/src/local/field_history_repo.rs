use chrono::{DateTime, Utc};
use sqlx_core::row::Row;
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::{FieldHistory, FieldRef};

/// Ordering key of one active history row; `seq` breaks `changed_at` ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryOrder {
    pub id: Uuid,
    pub changed_at: DateTime<Utc>,
    pub seq: i64,
}

pub struct FieldHistoryRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> FieldHistoryRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, history: &FieldHistory) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO field_history (
                id,
                item_id,
                field_key,
                field_definition_id,
                value_snapshot,
                changed_at,
                created_at,
                updated_at,
                is_deleted
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            history.id,
            history.item_id,
            history.field.system_key().map(str::to_string),
            history.field.definition_id(),
            history.value_snapshot.clone(),
            history.changed_at,
            history.created_at,
            history.updated_at,
            history.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn list_all(&mut self) -> Result<Vec<FieldHistory>, sqlx_core::Error> {
        query_as!(
            FieldHistory,
            r#"
            SELECT
                id,
                item_id,
                field_key,
                field_definition_id,
                value_snapshot,
                changed_at,
                created_at,
                updated_at,
                is_deleted
            FROM field_history
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    /// Active history rows of one item, in insertion order.
    pub async fn list_active_by_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Vec<FieldHistory>, sqlx_core::Error> {
        query_as!(
            FieldHistory,
            r#"
            SELECT
                id,
                item_id,
                field_key,
                field_definition_id,
                value_snapshot,
                changed_at,
                created_at,
                updated_at,
                is_deleted
            FROM field_history
            WHERE item_id = ?1 AND is_deleted = 0
            ORDER BY rowid
            "#,
            item_id
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    /// Ordering keys of the active rows for one (item, field) pair.
    pub async fn list_order_keys(
        &mut self,
        item_id: Uuid,
        field: &FieldRef,
    ) -> Result<Vec<HistoryOrder>, sqlx_core::Error> {
        let rows = query!(
            r#"
            SELECT id, changed_at, rowid AS seq
            FROM field_history
            WHERE item_id = ?1
              AND is_deleted = 0
              AND field_key IS ?2
              AND field_definition_id IS ?3
            "#,
            item_id,
            field.system_key().map(str::to_string),
            field.definition_id()
        )
        .fetch_all(&mut *self.conn)
        .await?;
        rows.iter()
            .map(|row| -> Result<HistoryOrder, sqlx_core::Error> {
                let bytes: Vec<u8> = row.try_get("id")?;
                Ok(HistoryOrder {
                    id: Uuid::from_slice(&bytes)
                        .map_err(|err| sqlx_core::Error::Decode(Box::new(err)))?,
                    changed_at: row.try_get("changed_at")?,
                    seq: row.try_get("seq")?,
                })
            })
            .collect()
    }

    pub async fn soft_delete(
        &mut self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE field_history
            SET is_deleted = 1,
                updated_at = ?2
            WHERE id = ?1
            "#,
            id,
            updated_at
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_item(&mut self, item_id: Uuid) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            DELETE FROM field_history
            WHERE item_id = ?1
            "#,
            item_id
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }
}
