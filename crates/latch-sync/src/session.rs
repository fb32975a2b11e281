//! Working copy of an unlocked vault.
//!
//! The session owns the decrypted database. Every mutation made through it
//! is followed by export, encrypt and a dirty store, so the local store
//! always holds what the user last saw.
//!
//! The session remembers which blob generation its copy came from. When a
//! sync replaced the stored blob in the meantime, the working copy is merged
//! into the newer blob before it is written.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use latch_core::{ItemInput, ServiceError, StoreVaultRequest};
use latch_crypto::{SecretKey, VaultCipher};
use latch_db::{ItemStore, VaultDatabase};

use crate::engine::SyncError;
use crate::local_store::{LocalVaultStore, StoreError};
use crate::merge::merge_vaults;

const PERSIST_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<latch_db::ImageError> for SessionError {
    fn from(err: latch_db::ImageError) -> Self {
        Self::Sync(err.into())
    }
}

pub struct VaultSession {
    store: Arc<LocalVaultStore>,
    cipher: Arc<dyn VaultCipher>,
    db: VaultDatabase,
    /// `None` until the first write of a freshly created vault.
    generation: Option<i64>,
}

impl VaultSession {
    /// Starts a new, empty vault and stores it as the first local change.
    pub async fn create(
        store: Arc<LocalVaultStore>,
        cipher: Arc<dyn VaultCipher>,
    ) -> Result<Self, SessionError> {
        let db = VaultDatabase::create_empty().await?;
        let mut session = Self {
            store,
            cipher,
            db,
            generation: None,
        };
        session.persist().await?;
        tracing::info!(event = "vault_session_created");
        Ok(session)
    }

    /// Opens the vault currently held by the local store.
    pub async fn open(
        store: Arc<LocalVaultStore>,
        cipher: Arc<dyn VaultCipher>,
    ) -> Result<Self, SessionError> {
        let (db, generation) = Self::open_stored(&store, cipher.as_ref()).await?;
        Ok(Self {
            store,
            cipher,
            db,
            generation: Some(generation),
        })
    }

    async fn open_stored(
        store: &LocalVaultStore,
        cipher: &dyn VaultCipher,
    ) -> Result<(VaultDatabase, i64), SessionError> {
        let key = Self::key(store).await?;
        let (plain, generation) = Self::stored_image(store, cipher, &key).await?;
        Ok((VaultDatabase::open_image(&plain).await?, generation))
    }

    async fn stored_image(
        store: &LocalVaultStore,
        cipher: &dyn VaultCipher,
        key: &SecretKey,
    ) -> Result<(Vec<u8>, i64), SyncError> {
        let (blob, metadata) = store.get_vault_with_metadata().await;
        let blob = blob.ok_or(SyncError::NoLocalVault)?;
        let plain = cipher
            .decrypt(&blob, key)
            .map_err(|err| SyncError::Decryption(err.to_string()))?;
        Ok((plain, metadata.blob_generation))
    }

    async fn key(store: &LocalVaultStore) -> Result<SecretKey, SyncError> {
        store.get_encryption_key().await.ok_or(SyncError::Locked)
    }

    pub fn items(&self) -> ItemStore<'_> {
        self.db.items()
    }

    pub fn database(&self) -> &VaultDatabase {
        &self.db
    }

    /// Writes the working copy back to the local store as a new mutation and
    /// returns its sequence number.
    ///
    /// If the stored blob changed since the copy was loaded, the copy is
    /// merged into the stored vault and the session continues on the result.
    pub async fn persist(&mut self) -> Result<i64, SessionError> {
        let key = Self::key(&self.store).await?;
        let mut image = self.db.export_image().await?;
        let mut rebased = false;
        for _ in 0..PERSIST_ATTEMPTS {
            let blob = self
                .cipher
                .encrypt(&image, &key)
                .map_err(|err| SyncError::Encryption(err.to_string()))?;
            let response = self
                .store
                .store_encrypted_vault(StoreVaultRequest {
                    blob,
                    mark_dirty: true,
                    expected_generation: self.generation,
                    ..StoreVaultRequest::default()
                })
                .await
                .map_err(SyncError::from)?;
            if response.success {
                self.generation = Some(response.generation);
                if rebased {
                    self.replace_db(VaultDatabase::open_image(&image).await?)
                        .await;
                }
                tracing::debug!(
                    event = "vault_session_persisted",
                    mutation_sequence = response.mutation_sequence,
                    rebased
                );
                return Ok(response.mutation_sequence);
            }

            let (stored, generation) =
                Self::stored_image(&self.store, self.cipher.as_ref(), &key).await?;
            image = merge_vaults(&image, &stored)
                .await
                .map_err(SyncError::from)?
                .blob;
            self.generation = Some(generation);
            rebased = true;
            tracing::info!(event = "vault_session_rebased", generation);
        }
        Err(SyncError::Storage(StoreError::SequenceMoved).into())
    }

    /// Re-opens the working copy from the stored blob, e.g. after a sync
    /// downloaded or merged new data.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let (db, generation) = Self::open_stored(&self.store, self.cipher.as_ref()).await?;
        self.replace_db(db).await;
        self.generation = Some(generation);
        tracing::debug!(event = "vault_session_reloaded");
        Ok(())
    }

    async fn replace_db(&mut self, db: VaultDatabase) {
        let previous = std::mem::replace(&mut self.db, db);
        previous.close().await;
    }

    pub async fn close(self) {
        self.db.close().await;
    }

    pub async fn create_item(&mut self, input: ItemInput) -> Result<Uuid, SessionError> {
        let id = self.items().create_item(input).await?;
        self.persist().await?;
        Ok(id)
    }

    /// Returns false, and stores nothing, when the input matched the item.
    pub async fn update_item(&mut self, id: Uuid, input: ItemInput) -> Result<bool, SessionError> {
        let changed = self.items().update_item(id, input).await?;
        if changed {
            self.persist().await?;
        }
        Ok(changed)
    }

    pub async fn trash_item(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.items().trash_item(id).await?;
        self.persist().await?;
        Ok(())
    }

    pub async fn restore_item(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.items().restore_item(id).await?;
        self.persist().await?;
        Ok(())
    }

    pub async fn permanently_delete_item(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.items().permanently_delete_item(id).await?;
        self.persist().await?;
        Ok(())
    }

    pub async fn purge_expired_trash(&mut self, retention: Duration) -> Result<usize, SessionError> {
        let purged = self.items().purge_expired_trash(retention).await?;
        if purged > 0 {
            self.persist().await?;
        }
        Ok(purged)
    }
}
