use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::Folder;

pub struct FolderRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> FolderRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, folder: &Folder) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO folders (id, name, parent_folder_id, created_at, updated_at, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            folder.id,
            folder.name.clone(),
            folder.parent_folder_id,
            folder.created_at,
            folder.updated_at,
            folder.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Folder>, sqlx_core::Error> {
        query_as!(
            Folder,
            r#"
            SELECT id, name, parent_folder_id, created_at, updated_at, is_deleted
            FROM folders
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    pub async fn list_all(&mut self) -> Result<Vec<Folder>, sqlx_core::Error> {
        query_as!(
            Folder,
            r#"
            SELECT id, name, parent_folder_id, created_at, updated_at, is_deleted
            FROM folders
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn rename(
        &mut self,
        id: Uuid,
        name: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE folders
            SET name = ?2,
                updated_at = ?3
            WHERE id = ?1 AND is_deleted = 0
            "#,
            id,
            name,
            updated_at
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_parent(
        &mut self,
        id: Uuid,
        parent_folder_id: Option<Uuid>,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE folders
            SET parent_folder_id = ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
            id,
            parent_folder_id,
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
            UPDATE folders
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
