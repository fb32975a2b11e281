use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::{FieldDefinition, FieldType};

pub struct FieldDefinitionRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> FieldDefinitionRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, definition: &FieldDefinition) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO field_definitions (
                id,
                label,
                field_type,
                is_multi_value,
                enable_history,
                weight,
                created_at,
                updated_at,
                is_deleted
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            definition.id,
            definition.label.clone(),
            FieldType::as_i32(definition.field_type),
            definition.is_multi_value,
            definition.enable_history,
            definition.weight,
            definition.created_at,
            definition.updated_at,
            definition.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<FieldDefinition>, sqlx_core::Error> {
        query_as!(
            FieldDefinition,
            r#"
            SELECT
                id,
                label,
                field_type,
                is_multi_value,
                enable_history,
                weight,
                created_at,
                updated_at,
                is_deleted
            FROM field_definitions
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    pub async fn list_all(&mut self) -> Result<Vec<FieldDefinition>, sqlx_core::Error> {
        query_as!(
            FieldDefinition,
            r#"
            SELECT
                id,
                label,
                field_type,
                is_multi_value,
                enable_history,
                weight,
                created_at,
                updated_at,
                is_deleted
            FROM field_definitions
            ORDER BY weight, rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn soft_delete(
        &mut self,
        id: Uuid,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE field_definitions
            SET is_deleted = 1,
                updated_at = ?2
            WHERE id = ?1 AND is_deleted = 0
            "#,
            id,
            updated_at
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }
}
