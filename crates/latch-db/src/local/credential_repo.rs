//! Per-item credential material: passkeys, TOTP seeds and file attachments.

use chrono::{DateTime, Utc};
use sqlx_sqlite::SqliteConnection;
use uuid::Uuid;

use latch_core::{Attachment, Passkey, TotpCode};

pub struct PasskeyRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PasskeyRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, passkey: &Passkey) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO passkeys (
                id,
                item_id,
                rp_id,
                user_handle,
                credential_blob,
                created_at,
                updated_at,
                is_deleted
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            passkey.id,
            passkey.item_id,
            passkey.rp_id.clone(),
            passkey.user_handle.clone(),
            passkey.credential_blob.clone(),
            passkey.created_at,
            passkey.updated_at,
            passkey.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn list_all(&mut self) -> Result<Vec<Passkey>, sqlx_core::Error> {
        query_as!(
            Passkey,
            r#"
            SELECT id, item_id, rp_id, user_handle, credential_blob, created_at, updated_at, is_deleted
            FROM passkeys
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn list_active_by_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Vec<Passkey>, sqlx_core::Error> {
        query_as!(
            Passkey,
            r#"
            SELECT id, item_id, rp_id, user_handle, credential_blob, created_at, updated_at, is_deleted
            FROM passkeys
            WHERE item_id = ?1 AND is_deleted = 0
            ORDER BY rowid
            "#,
            item_id
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
            UPDATE passkeys
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
        let result = query!("DELETE FROM passkeys WHERE item_id = ?1", item_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct TotpCodeRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TotpCodeRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, code: &TotpCode) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO totp_codes (id, item_id, name, secret_key, created_at, updated_at, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            code.id,
            code.item_id,
            code.name.clone(),
            code.secret_key.clone(),
            code.created_at,
            code.updated_at,
            code.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn list_all(&mut self) -> Result<Vec<TotpCode>, sqlx_core::Error> {
        query_as!(
            TotpCode,
            r#"
            SELECT id, item_id, name, secret_key, created_at, updated_at, is_deleted
            FROM totp_codes
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn list_active_by_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Vec<TotpCode>, sqlx_core::Error> {
        query_as!(
            TotpCode,
            r#"
            SELECT id, item_id, name, secret_key, created_at, updated_at, is_deleted
            FROM totp_codes
            WHERE item_id = ?1 AND is_deleted = 0
            ORDER BY rowid
            "#,
            item_id
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
            UPDATE totp_codes
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
        let result = query!("DELETE FROM totp_codes WHERE item_id = ?1", item_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct AttachmentRepo<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AttachmentRepo<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&mut self, attachment: &Attachment) -> Result<(), sqlx_core::Error> {
        query!(
            r#"
            INSERT INTO attachments (id, item_id, filename, blob, created_at, updated_at, is_deleted)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            attachment.id,
            attachment.item_id,
            attachment.filename.clone(),
            attachment.blob.clone(),
            attachment.created_at,
            attachment.updated_at,
            attachment.is_deleted
        )
        .execute(&mut *self.conn)
        .await
        .map(|_| ())
    }

    pub async fn list_all(&mut self) -> Result<Vec<Attachment>, sqlx_core::Error> {
        query_as!(
            Attachment,
            r#"
            SELECT id, item_id, filename, blob, created_at, updated_at, is_deleted
            FROM attachments
            ORDER BY rowid
            "#
        )
        .fetch_all(&mut *self.conn)
        .await
    }

    pub async fn list_active_by_item(
        &mut self,
        item_id: Uuid,
    ) -> Result<Vec<Attachment>, sqlx_core::Error> {
        query_as!(
            Attachment,
            r#"
            SELECT id, item_id, filename, blob, created_at, updated_at, is_deleted
            FROM attachments
            WHERE item_id = ?1 AND is_deleted = 0
            ORDER BY rowid
            "#,
            item_id
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
            UPDATE attachments
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
        let result = query!("DELETE FROM attachments WHERE item_id = ?1", item_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}
