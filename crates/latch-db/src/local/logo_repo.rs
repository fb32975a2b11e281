use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::Logo;

pub struct LogoRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LogoRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, logo: &Logo) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO logos (id, source, mime_type, file_data, created_at, updated_at, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            logo.id,
            logo.source.clone(),
            logo.mime_type.clone(),
            logo.file_data.clone(),
            logo.created_at,
            logo.updated_at,
            logo.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Logo>, sqlx_core::Error> {
        query_as!(
            Logo,
            r#"
            SELECT id, source, mime_type, file_data, created_at, updated_at, is_deleted
            FROM logos
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    /// Newest live logo registered for `source`.
    pub async fn find_live_by_source(
        &mut self,
        source: &str,
    ) -> Result<Option<Logo>, sqlx_core::Error> {
        query_as!(
            Logo,
            r#"
            SELECT id, source, mime_type, file_data, created_at, updated_at, is_deleted
            FROM logos
            WHERE source = ?1 AND is_deleted = 0
            ORDER BY rowid DESC
            LIMIT 1
            "#,
            source
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    pub async fn list_all(&mut self) -> Result<Vec<Logo>, sqlx_core::Error> {
        query_as!(
            Logo,
            r#"
            SELECT id, source, mime_type, file_data, created_at, updated_at, is_deleted
            FROM logos
            ORDER BY rowid
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
            UPDATE logos
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
