use chrono::{DateTime, Utc};
use sqlx_core::query_builder::QueryBuilder;
use sqlx_core::row::Row;
use sqlx_sqlite::{Sqlite, SqliteConnection};
use uuid::Uuid;

use latch_core::{Item, ItemType};

/// Column changes for one item; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub item_type: Option<ItemType>,
    pub folder_id: Option<Option<Uuid>>,
    pub logo_id: Option<Option<Uuid>>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.item_type.is_none()
            && self.folder_id.is_none()
            && self.logo_id.is_none()
    }
}

pub struct ItemRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ItemRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, item: &Item) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO items (
                id,
                name,
                item_type,
                folder_id,
                logo_id,
                created_at,
                updated_at,
                is_deleted,
                deleted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            item.id,
            item.name.clone(),
            item.item_type.map(ItemType::as_i32),
            item.folder_id,
            item.logo_id,
            item.created_at,
            item.updated_at,
            item.is_deleted,
            item.deleted_at
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn get(&mut self, id: Uuid) -> Result<Option<Item>, sqlx_core::Error> {
        query_as!(
            Item,
            r#"
            SELECT
                id,
                name,
                item_type,
                folder_id,
                logo_id,
                created_at,
                updated_at,
                is_deleted,
                deleted_at
            FROM items
            WHERE id = ?1
            "#,
            id
        )
        .fetch_optional(&mut *self.conn)
        .await
    }

    /// Every row, tombstones included.
    pub async fn list_all(&mut self) -> Result<Vec<Item>, sqlx_core::Error> {
        query_as!(
            Item,
            r#"
            SELECT
                id,
                name,
                item_type,
                folder_id,
                logo_id,
                created_at,
                updated_at,
                is_deleted,
                deleted_at
            FROM items
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    /// Non-tombstoned rows; trashed ones only when `include_trashed`.
    pub async fn list_visible(
        &mut self,
        include_trashed: bool,
    ) -> Result<Vec<Item>, sqlx_core::Error> {
        query_as!(
            Item,
            r#"
            SELECT
                id,
                name,
                item_type,
                folder_id,
                logo_id,
                created_at,
                updated_at,
                is_deleted,
                deleted_at
            FROM items
            WHERE is_deleted = 0
              AND (?1 OR deleted_at IS NULL)
            ORDER BY name COLLATE NOCASE, rowid
            "#,
            include_trashed
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn list_trashed(&mut self) -> Result<Vec<Item>, sqlx_core::Error> {
        query_as!(
            Item,
            r#"
            SELECT
                id,
                name,
                item_type,
                folder_id,
                logo_id,
                created_at,
                updated_at,
                is_deleted,
                deleted_at
            FROM items
            WHERE is_deleted = 0 AND deleted_at IS NOT NULL
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn list_by_folder(&mut self, folder_id: Uuid) -> Result<Vec<Item>, sqlx_core::Error> {
        query_as!(
            Item,
            r#"
            SELECT
                id,
                name,
                item_type,
                folder_id,
                logo_id,
                created_at,
                updated_at,
                is_deleted,
                deleted_at
            FROM items
            WHERE folder_id = ?1 AND is_deleted = 0
            ORDER BY rowid
            "#,
            folder_id
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    /// Writes only the changed columns plus `updated_at`.
    pub async fn update_columns(
        &mut self,
        id: Uuid,
        changes: &ItemChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE items SET ");
        let mut set = builder.separated(", ");
        if let Some(name) = &changes.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(item_type) = changes.item_type {
            set.push("item_type = ")
                .push_bind_unseparated(item_type.as_i32());
        }
        if let Some(folder_id) = changes.folder_id {
            set.push("folder_id = ").push_bind_unseparated(folder_id);
        }
        if let Some(logo_id) = changes.logo_id {
            set.push("logo_id = ").push_bind_unseparated(logo_id);
        }
        set.push("updated_at = ").push_bind_unseparated(updated_at);
        builder.push(" WHERE id = ").push_bind(id);
        let result = builder.build().execute(&mut *self.conn).await?;
        Ok(result.rows_affected())
    }

    pub async fn set_trashed_at(
        &mut self,
        id: Uuid,
        deleted_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE items
            SET deleted_at = ?2,
                updated_at = ?3
            WHERE id = ?1 AND is_deleted = 0
            "#,
            id,
            deleted_at,
            updated_at
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Overwrites the row with its tombstone form.
    pub async fn write_tombstone(&mut self, tombstone: &Item) -> Result<u64, sqlx_core::Error> {
        let result = query!(
            r#"
            UPDATE items
            SET name = NULL,
                item_type = NULL,
                folder_id = NULL,
                logo_id = NULL,
                is_deleted = 1,
                deleted_at = ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
            tombstone.id,
            tombstone.deleted_at,
            tombstone.updated_at
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Live or trashed items other than `except` that still point at the logo.
    pub async fn count_logo_references(
        &mut self,
        logo_id: Uuid,
        except: Uuid,
    ) -> Result<i64, sqlx_core::Error> {
        let row = query!(
            r#"
            SELECT COUNT(*) AS refs
            FROM items
            WHERE logo_id = ?1 AND id != ?2 AND is_deleted = 0
            "#,
            logo_id,
            except
        )
        .fetch_one(&mut *self.conn)
        .await?;
        row.try_get("refs")
    }
}
