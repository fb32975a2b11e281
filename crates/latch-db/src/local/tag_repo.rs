use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::{ItemTag, Tag};

pub struct TagRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TagRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, tag: &Tag) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO tags (id, name, color, created_at, updated_at, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            tag.id,
            tag.name.clone(),
            tag.color.clone(),
            tag.created_at,
            tag.updated_at,
            tag.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Tag>, sqlx_core::Error> {
        query_as!(
            Tag,
            r#"
            SELECT id, name, color, created_at, updated_at, is_deleted
            FROM tags
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    pub async fn list_all(&mut self) -> Result<Vec<Tag>, sqlx_core::Error> {
        query_as!(
            Tag,
            r#"
            SELECT id, name, color, created_at, updated_at, is_deleted
            FROM tags
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }
}

pub struct ItemTagRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ItemTagRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, link: &ItemTag) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO item_tags (id, item_id, tag_id, created_at, updated_at, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            link.id,
            link.item_id,
            link.tag_id,
            link.created_at,
            link.updated_at,
            link.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn find_active(
        &mut self,
        item_id: Uuid,
        tag_id: Uuid,
    ) -> Result<Option<ItemTag>, sqlx_core::Error> {
        query_as!(
            ItemTag,
            r#"
            SELECT id, item_id, tag_id, created_at, updated_at, is_deleted
            FROM item_tags
            WHERE item_id = ?1 AND tag_id = ?2 AND is_deleted = 0
            "#,
            item_id,
            tag_id
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    pub async fn list_active_by_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Vec<ItemTag>, sqlx_core::Error> {
        query_as!(
            ItemTag,
            r#"
            SELECT id, item_id, tag_id, created_at, updated_at, is_deleted
            FROM item_tags
            WHERE item_id = ?1 AND is_deleted = 0
            ORDER BY rowid
            "#,
            item_id
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn list_all(&mut self) -> Result<Vec<ItemTag>, sqlx_core::Error> {
        query_as!(
            ItemTag,
            r#"
            SELECT id, item_id, tag_id, created_at, updated_at, is_deleted
            FROM item_tags
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
            UPDATE item_tags
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

    pub async fn delete_by_item(&mut self, item_id: Uuid) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            DELETE FROM item_tags
            WHERE item_id = ?1
            "#,
            item_id
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }
}
