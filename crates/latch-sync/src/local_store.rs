//! Device-local vault storage: the encrypted blob, its sync metadata and the
//! key material a UI or autofill collaborator needs.
//!
//! All state sits behind one `tokio::sync::Mutex`; every tracker transition
//! and the disk write that follows it happen under that lock.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use latch_core::{
    MarkCleanRequest, StoreVaultRequest, StoreVaultResponse, SyncState, VaultDownload,
};
use latch_crypto::{KdfParams, SecretKey};

use crate::tracker::VaultMetadata;

const STATE_FILENAME: &str = "state.json";
const BLOB_FILENAME: &str = "vault.blob";
const RECOVERY_FILENAME: &str = "recovery.blob";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("vault image error: {0}")]
    Image(#[from] latch_db::ImageError),
    #[error("local vault changed while it was being rewritten")]
    SequenceMoved,
}

/// Email domain lists delivered with the last download, kept for alias UIs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmailDomains {
    #[serde(default)]
    pub public: Vec<String>,
    #[serde(default)]
    pub private: Vec<String>,
    #[serde(default)]
    pub hidden_private: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    metadata: VaultMetadata,
    #[serde(default)]
    kdf_params: Option<KdfParams>,
    #[serde(default)]
    email_domains: EmailDomains,
}

#[derive(Default)]
struct Inner {
    state: PersistedState,
    blob: Option<Vec<u8>>,
    recovery: Option<Vec<u8>>,
    key: Option<SecretKey>,
}

pub struct LocalVaultStore {
    dir: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl LocalVaultStore {
    /// Store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Opens (or starts) a store persisted under `dir`. The key is never
    /// written; it has to be supplied again after every start.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await?;
        let state_path = dir.join(STATE_FILENAME);
        let state = match tokio::fs::read_to_string(&state_path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(err) => return Err(err.into()),
        };
        let blob = read_optional(&dir.join(BLOB_FILENAME)).await?;
        let recovery = read_optional(&dir.join(RECOVERY_FILENAME)).await?;
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            inner: Mutex::new(Inner {
                state,
                blob,
                recovery,
                key: None,
            }),
        })
    }

    /// Stores a new encrypted vault.
    ///
    /// With `expected_mutation_seq` or `expected_generation` set, the write
    /// only happens when the current value still matches; otherwise `success`
    /// is false and nothing changes.
    pub async fn store_encrypted_vault(
        &self,
        request: StoreVaultRequest,
    ) -> Result<StoreVaultResponse, StoreError> {
        let mut inner = self.inner.lock().await;
        let current = inner.state.metadata;
        let sequence_moved = request
            .expected_mutation_seq
            .is_some_and(|expected| expected != current.mutation_sequence);
        let generation_moved = request
            .expected_generation
            .is_some_and(|expected| expected != current.blob_generation);
        if sequence_moved || generation_moved {
            tracing::debug!(
                event = "vault_store_skipped",
                expected_sequence = ?request.expected_mutation_seq,
                expected_generation = ?request.expected_generation,
                current_sequence = current.mutation_sequence,
                current_generation = current.blob_generation
            );
            return Ok(StoreVaultResponse {
                success: false,
                mutation_sequence: current.mutation_sequence,
                generation: current.blob_generation,
            });
        }
        let mut next = inner.state.clone();
        next.metadata.record_blob_write();
        if request.mark_dirty {
            next.metadata.mark_dirty();
        }
        if let Some(revision) = request.server_revision {
            next.metadata.server_revision = revision;
        }
        self.persist(&next, Some(&request.blob)).await?;
        inner.state = next;
        inner.blob = Some(request.blob);
        Ok(StoreVaultResponse {
            success: true,
            mutation_sequence: inner.state.metadata.mutation_sequence,
            generation: inner.state.metadata.blob_generation,
        })
    }

    pub async fn get_encrypted_vault(&self) -> Option<Vec<u8>> {
        self.inner.lock().await.blob.clone()
    }

    /// Blob and sync state read under the same lock.
    pub async fn get_vault_with_state(&self) -> (Option<Vec<u8>>, SyncState) {
        let inner = self.inner.lock().await;
        (inner.blob.clone(), inner.state.metadata.sync_state())
    }

    /// Blob and full metadata, including the blob generation, read together.
    pub async fn get_vault_with_metadata(&self) -> (Option<Vec<u8>>, VaultMetadata) {
        let inner = self.inner.lock().await;
        (inner.blob.clone(), inner.state.metadata)
    }

    pub async fn has_vault(&self) -> bool {
        self.inner.lock().await.blob.is_some()
    }

    pub async fn get_sync_state(&self) -> SyncState {
        self.inner.lock().await.state.metadata.sync_state()
    }

    pub async fn metadata(&self) -> VaultMetadata {
        self.inner.lock().await.state.metadata
    }

    /// Applies the tracker's compare-and-clear. Returns whether it cleared.
    pub async fn mark_vault_clean(&self, request: MarkCleanRequest) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut next = inner.state.clone();
        if !next
            .metadata
            .compare_and_clear(request.mutation_seq_at_start, request.new_server_revision)
        {
            tracing::debug!(
                event = "vault_clean_refused",
                expected = request.mutation_seq_at_start,
                current = next.metadata.mutation_sequence
            );
            return Ok(false);
        }
        self.persist(&next, None).await?;
        inner.state = next;
        Ok(true)
    }

    pub async fn set_offline(&self, offline: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.state.metadata.is_offline == offline {
            return Ok(());
        }
        let mut next = inner.state.clone();
        next.metadata.is_offline = offline;
        self.persist(&next, None).await?;
        inner.state = next;
        Ok(())
    }

    pub async fn store_email_domains(&self, download: &VaultDownload) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let mut next = inner.state.clone();
        next.email_domains = EmailDomains {
            public: download.public_email_domain_list.clone(),
            private: download.private_email_domain_list.clone(),
            hidden_private: download.hidden_private_email_domain_list.clone(),
        };
        if next.email_domains == inner.state.email_domains {
            return Ok(());
        }
        self.persist(&next, None).await?;
        inner.state = next;
        Ok(())
    }

    /// Keeps a local blob that could not be reconciled with the server so
    /// nothing it holds is lost when the server copy is adopted.
    pub async fn store_recovery_blob(&self, blob: Vec<u8>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(dir) = &self.dir {
            write_replacing(&dir.join(RECOVERY_FILENAME), &blob).await?;
        }
        inner.recovery = Some(blob);
        tracing::warn!(event = "vault_recovery_copy_saved");
        Ok(())
    }

    pub async fn get_recovery_blob(&self) -> Option<Vec<u8>> {
        self.inner.lock().await.recovery.clone()
    }

    pub async fn email_domains(&self) -> EmailDomains {
        self.inner.lock().await.state.email_domains.clone()
    }

    /// Unlocks the store with a derived key and remembers how it was derived.
    pub async fn set_encryption_key(
        &self,
        key: SecretKey,
        params: KdfParams,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.state.kdf_params.as_ref() != Some(&params) {
            let mut next = inner.state.clone();
            next.kdf_params = Some(params);
            self.persist(&next, None).await?;
            inner.state = next;
        }
        tracing::debug!(event = "vault_unlocked", key_fp = %key.fingerprint());
        inner.key = Some(key);
        Ok(())
    }

    pub async fn get_encryption_key(&self) -> Option<SecretKey> {
        self.inner.lock().await.key.clone()
    }

    pub async fn get_encryption_key_derivation_params(&self) -> Option<KdfParams> {
        self.inner.lock().await.state.kdf_params.clone()
    }

    pub async fn lock(&self) {
        self.inner.lock().await.key = None;
    }

    /// Drops the key and every stored byte of the vault.
    pub async fn logout(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.key = None;
        inner.blob = None;
        inner.recovery = None;
        inner.state = PersistedState::default();
        if let Some(dir) = &self.dir {
            for name in [STATE_FILENAME, BLOB_FILENAME, RECOVERY_FILENAME] {
                match tokio::fs::remove_file(dir.join(name)).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        tracing::warn!(event = "vault_logged_out");
        Ok(())
    }

    async fn persist(&self, state: &PersistedState, blob: Option<&[u8]>) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        if let Some(blob) = blob {
            write_replacing(&dir.join(BLOB_FILENAME), blob).await?;
        }
        let contents = serde_json::to_vec_pretty(state)?;
        write_replacing(&dir.join(STATE_FILENAME), &contents).await?;
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, std::io::Error> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

async fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}
