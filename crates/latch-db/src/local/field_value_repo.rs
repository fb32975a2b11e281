use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::FieldValue;

pub struct FieldValueRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> FieldValueRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, value: &FieldValue) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO field_values (
                id,
                item_id,
                field_key,
                field_definition_id,
                value,
                weight,
                created_at,
                updated_at,
                is_deleted
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            value.id,
            value.item_id,
            value.field.system_key().map(str::to_string),
            value.field.definition_id(),
            value.value.clone(),
            value.weight,
            value.created_at,
            value.updated_at,
            value.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn list_all(&mut self) -> Result<Vec<FieldValue>, sqlx_core::Error> {
        query_as!(
            FieldValue,
            r#"
            SELECT
                id,
                item_id,
                field_key,
                field_definition_id,
                value,
                weight,
                created_at,
                updated_at,
                is_deleted
            FROM field_values
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    /// Active values of one item in display order.
    pub async fn list_active_by_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Vec<FieldValue>, sqlx_core::Error> {
        query_as!(
            FieldValue,
            r#"
            SELECT
                id,
                item_id,
                field_key,
                field_definition_id,
                value,
                weight,
                created_at,
                updated_at,
                is_deleted
            FROM field_values
            WHERE item_id = ?1 AND is_deleted = 0
            ORDER BY weight, rowid
            "#,
            item_id
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn update_value(
        &mut self,
        id: Uuid,
        value: &str,
        weight: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE field_values
            SET value = ?2,
                weight = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
            id,
            value,
            weight,
            updated_at
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn soft_delete(
        &mut self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE field_values
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
            DELETE FROM field_values
            WHERE item_id = ?1
            "#,
            item_id
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }
}
