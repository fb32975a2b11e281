use uuid::Uuid;

use latch_core::{now, Attachment, Passkey, ServiceResult, TotpCode};

use crate::local::{AttachmentRepo, PasskeyRepo, TotpCodeRepo};

use super::{db_error, ItemStore};

impl<'a> ItemStore<'a> {
    pub async fn add_totp_code(
        &self,
        item_id: Uuid,
        name: &str,
        secret_key: &str,
    ) -> ServiceResult<Uuid> {
        let mut tx = self.begin().await?;
        Self::load_mutable_item(&mut tx, item_id).await?;
        let at = now();
        let code = TotpCode {
            id: Uuid::now_v7(),
            item_id,
            name: name.to_string(),
            secret_key: secret_key.to_string(),
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        TotpCodeRepo::new(&mut tx)
            .insert(&code)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(code.id)
    }

    pub async fn remove_totp_code(&self, id: Uuid) -> ServiceResult<bool> {
        let mut tx = self.begin().await?;
        let removed = TotpCodeRepo::new(&mut tx)
            .soft_delete(id, now())
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(removed > 0)
    }

    pub async fn list_totp_codes(&self, item_id: Uuid) -> ServiceResult<Vec<TotpCode>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        TotpCodeRepo::new(&mut conn)
            .list_active_by_item(item_id)
            .await
            .map_err(db_error)
    }

    pub async fn add_passkey(
        &self,
        item_id: Uuid,
        rp_id: &str,
        user_handle: Vec<u8>,
        credential_blob: Vec<u8>,
    ) -> ServiceResult<Uuid> {
        let mut tx = self.begin().await?;
        Self::load_mutable_item(&mut tx, item_id).await?;
        let at = now();
        let passkey = Passkey {
            id: Uuid::now_v7(),
            item_id,
            rp_id: rp_id.to_string(),
            user_handle,
            credential_blob,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        PasskeyRepo::new(&mut tx)
            .insert(&passkey)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(passkey.id)
    }

    pub async fn remove_passkey(&self, id: Uuid) -> ServiceResult<bool> {
        let mut tx = self.begin().await?;
        let removed = PasskeyRepo::new(&mut tx)
            .soft_delete(id, now())
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(removed > 0)
    }

    pub async fn list_passkeys(&self, item_id: Uuid) -> ServiceResult<Vec<Passkey>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        PasskeyRepo::new(&mut conn)
            .list_active_by_item(item_id)
            .await
            .map_err(db_error)
    }

    pub async fn add_attachment(
        &self,
        item_id: Uuid,
        filename: &str,
        blob: Vec<u8>,
    ) -> ServiceResult<Uuid> {
        let mut tx = self.begin().await?;
        Self::load_mutable_item(&mut tx, item_id).await?;
        let at = now();
        let attachment = Attachment {
            id: Uuid::now_v7(),
            item_id,
            filename: filename.to_string(),
            blob,
            created_at: at,
            updated_at: at,
            is_deleted: false,
        };
        AttachmentRepo::new(&mut tx)
            .insert(&attachment)
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(attachment.id)
    }

    pub async fn remove_attachment(&self, id: Uuid) -> ServiceResult<bool> {
        let mut tx = self.begin().await?;
        let removed = AttachmentRepo::new(&mut tx)
            .soft_delete(id, now())
            .await
            .map_err(db_error)?;
        Self::commit(tx).await?;
        Ok(removed > 0)
    }

    pub async fn list_attachments(&self, item_id: Uuid) -> ServiceResult<Vec<Attachment>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        AttachmentRepo::new(&mut conn)
            .list_active_by_item(item_id)
            .await
            .map_err(db_error)
    }
}
