//! Upload / download / merge state machine.
//!
//! One cycle is a bounded loop of attempts. Each attempt re-reads the server
//! status and the local sync state, then takes exactly one path: nothing to
//! do, upload, download, or download-merge-upload. Optimistic-concurrency
//! losses (an `Outdated` upload, a local write racing the cycle) end the
//! attempt and start the next one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use latch_core::{
    MarkCleanRequest, ServerStatus, StoreVaultRequest, SyncState, UploadRequest, UploadStatus,
    VaultDownload, LATEST_SCHEMA_REVISION, SUPPORTED_SERVER_API_MAJOR,
};
use latch_crypto::{SecretKey, VaultCipher};
use latch_db::VaultDatabase;

use crate::local_store::{LocalVaultStore, StoreError};
use crate::merge::{merge_vaults, MergeError, MergeStats};
use crate::settings::SyncSettings;
use crate::transport::{SyncTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NoChanges,
    Uploaded { revision: i64 },
    Downloaded { revision: i64 },
    Merged { revision: i64, stats: MergeStats },
    /// The local vault could not be merged. It was kept as a recovery copy
    /// and the server revision was adopted in its place.
    Recovered { revision: i64, reason: String },
    /// The server was unreachable; the local vault stays authoritative.
    Offline,
    /// The server or local vault was written by an older schema and has to
    /// be upgraded before the two can be merged.
    UpgradeRequired { schema: i64 },
    /// Another cycle was already running and will re-check on our behalf.
    Coalesced,
}

impl SyncOutcome {
    /// Whether the local vault now holds data it did not have before.
    #[must_use]
    pub fn brought_new_data(&self) -> bool {
        matches!(
            self,
            Self::Downloaded { .. } | Self::Merged { .. } | Self::Recovered { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server version {server_version} is not supported")]
    VersionIncompatible { server_version: String },
    #[error("vault could not be decrypted, sign in again: {0}")]
    Decryption(String),
    #[error("vault could not be encrypted: {0}")]
    Encryption(String),
    #[error("credentials changed on another device, sign in again")]
    AuthenticationInvalidated,
    #[error("vault schema {found} is newer than supported {supported}")]
    SchemaIncompatible { found: i64, supported: i64 },
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("sync gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("server rejected the upload: {0}")]
    Upload(String),
    #[error("local storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("vault is locked")]
    Locked,
    #[error("no local vault")]
    NoLocalVault,
}

impl From<latch_db::ImageError> for SyncError {
    fn from(err: latch_db::ImageError) -> Self {
        Self::Storage(StoreError::Image(err))
    }
}

enum Step {
    Done(SyncOutcome),
    Retry(&'static str),
}

#[derive(Default)]
struct CycleState {
    running: bool,
    pending: bool,
}

/// Clears the running flag if the owning `request_sync` future is dropped
/// before it finishes, so later triggers are not coalesced into nothing.
struct RunningCycle<'a> {
    cycle: &'a Mutex<CycleState>,
    finished: bool,
}

impl Drop for RunningCycle<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut cycle = lock_cycle(self.cycle);
        cycle.running = false;
        cycle.pending = false;
        tracing::warn!(event = "sync_cycle_abandoned");
    }
}

fn lock_cycle(cycle: &Mutex<CycleState>) -> MutexGuard<'_, CycleState> {
    cycle.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SyncEngine {
    transport: Arc<dyn SyncTransport>,
    store: Arc<LocalVaultStore>,
    cipher: Arc<dyn VaultCipher>,
    settings: SyncSettings,
    cycle: Mutex<CycleState>,
}

impl SyncEngine {
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        store: Arc<LocalVaultStore>,
        cipher: Arc<dyn VaultCipher>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            transport,
            store,
            cipher,
            settings,
            cycle: Mutex::new(CycleState::default()),
        }
    }

    pub fn store(&self) -> &Arc<LocalVaultStore> {
        &self.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Runs a sync cycle unless one is already running.
    ///
    /// A trigger that arrives mid-cycle returns `Coalesced` at once; the
    /// running caller then performs one more cycle before returning. When
    /// that re-check finds nothing new, the first cycle's outcome is kept.
    /// Dropping the returned future mid-cycle releases the cycle.
    pub async fn request_sync(&self) -> Result<SyncOutcome, SyncError> {
        {
            let mut cycle = lock_cycle(&self.cycle);
            if cycle.running {
                cycle.pending = true;
                tracing::debug!(event = "sync_coalesced");
                return Ok(SyncOutcome::Coalesced);
            }
            cycle.running = true;
        }
        let mut running = RunningCycle {
            cycle: &self.cycle,
            finished: false,
        };

        let mut result = self.sync_once().await;
        loop {
            let rerun = {
                let mut cycle = lock_cycle(&self.cycle);
                if cycle.pending {
                    cycle.pending = false;
                    true
                } else {
                    cycle.running = false;
                    running.finished = true;
                    false
                }
            };
            if !rerun {
                break;
            }
            tracing::debug!(event = "sync_recheck");
            result = match self.sync_once().await {
                Ok(SyncOutcome::NoChanges) if result.is_ok() => result,
                other => other,
            };
        }
        result
    }

    /// One full cycle, ignoring coalescing.
    pub async fn sync_once(&self) -> Result<SyncOutcome, SyncError> {
        let key = self
            .store
            .get_encryption_key()
            .await
            .ok_or(SyncError::Locked)?;
        let attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.attempt(&key).await {
                Ok(Step::Done(outcome)) => {
                    tracing::info!(event = "sync_finished", attempt, outcome = ?outcome);
                    return Ok(outcome);
                }
                Ok(Step::Retry(reason)) => {
                    tracing::info!(event = "sync_retry", attempt, reason);
                }
                Err(err) => {
                    tracing::warn!(event = "sync_failed", attempt, error = %err);
                    return Err(err);
                }
            }
        }
        tracing::warn!(event = "sync_retries_exhausted", attempts);
        Err(SyncError::RetriesExhausted { attempts })
    }

    async fn attempt(&self, key: &SecretKey) -> Result<Step, SyncError> {
        let status = match self.transport.get_status().await {
            Ok(status) => status,
            Err(err) => return self.unreachable(err).await,
        };
        self.store.set_offline(false).await?;
        check_server_version(&status)?;
        self.check_credentials(&status).await?;

        let (blob, state) = self.store.get_vault_with_state().await;
        let Some(local_blob) = blob else {
            if status.vault_revision > 0 {
                return self.download(key, &state, None).await;
            }
            return Err(SyncError::NoLocalVault);
        };

        if status.vault_revision > state.server_revision {
            return self.download(key, &state, Some(local_blob)).await;
        }
        if !state.is_dirty && status.vault_revision == state.server_revision {
            return Ok(Step::Done(SyncOutcome::NoChanges));
        }
        if status.vault_revision < state.server_revision {
            tracing::warn!(
                event = "sync_server_behind",
                server_revision = status.vault_revision,
                local_revision = state.server_revision
            );
        }
        self.upload(local_blob, status.vault_revision, state.mutation_sequence)
            .await
    }

    async fn unreachable(&self, err: TransportError) -> Result<Step, SyncError> {
        match err {
            TransportError::Unreachable(reason) => {
                if self.store.has_vault().await {
                    tracing::info!(event = "sync_offline", reason = %reason);
                    self.store.set_offline(true).await?;
                    Ok(Step::Done(SyncOutcome::Offline))
                } else {
                    Err(SyncError::Network(reason))
                }
            }
            TransportError::Server(reason) => Err(SyncError::Network(reason)),
        }
    }

    async fn check_credentials(&self, status: &ServerStatus) -> Result<(), SyncError> {
        let Some(params) = self.store.get_encryption_key_derivation_params().await else {
            return Ok(());
        };
        if params.salt == status.srp_salt {
            return Ok(());
        }
        tracing::warn!(event = "sync_credentials_changed");
        self.store.logout().await?;
        Err(SyncError::AuthenticationInvalidated)
    }

    async fn upload(
        &self,
        blob: Vec<u8>,
        base_revision: i64,
        mutation_seq_at_start: i64,
    ) -> Result<Step, SyncError> {
        let request = UploadRequest {
            blob,
            current_revision_number: base_revision,
            mutation_seq_at_start,
        };
        let response = match self.transport.upload_vault(request).await {
            Ok(response) => response,
            Err(err) => return self.unreachable(err).await,
        };
        match response.status {
            UploadStatus::Accepted => {
                let cleared = self
                    .store
                    .mark_vault_clean(MarkCleanRequest {
                        mutation_seq_at_start,
                        new_server_revision: response.new_revision_number,
                    })
                    .await?;
                if !cleared {
                    return Ok(Step::Retry("local vault changed during upload"));
                }
                tracing::info!(
                    event = "sync_uploaded",
                    revision = response.new_revision_number
                );
                Ok(Step::Done(SyncOutcome::Uploaded {
                    revision: response.new_revision_number,
                }))
            }
            UploadStatus::Outdated => Ok(Step::Retry("server revision moved on")),
            UploadStatus::Rejected => Err(SyncError::Upload(
                response
                    .error
                    .unwrap_or_else(|| "upload rejected".to_string()),
            )),
        }
    }

    async fn download(
        &self,
        key: &SecretKey,
        state: &SyncState,
        local_blob: Option<Vec<u8>>,
    ) -> Result<Step, SyncError> {
        let download = match self.transport.get_vault().await {
            Ok(download) => download,
            Err(err) => return self.unreachable(err).await,
        };
        let server_plain = self.decrypt(&download.blob, key)?;
        let server_schema = image_schema(&server_plain).await?;
        if server_schema > LATEST_SCHEMA_REVISION {
            return Err(SyncError::SchemaIncompatible {
                found: server_schema,
                supported: LATEST_SCHEMA_REVISION,
            });
        }
        if server_schema < LATEST_SCHEMA_REVISION {
            tracing::warn!(
                event = "sync_upgrade_required",
                side = "server",
                schema = server_schema
            );
            return Ok(Step::Done(SyncOutcome::UpgradeRequired {
                schema: server_schema,
            }));
        }
        self.store.store_email_domains(&download).await?;

        let local_blob = match local_blob {
            Some(blob) if state.is_dirty => blob,
            _ => return self.adopt(download, state.mutation_sequence).await,
        };

        let local_plain = self.decrypt(&local_blob, key)?;
        match image_schema(&local_plain).await {
            Ok(schema) if schema < LATEST_SCHEMA_REVISION => {
                tracing::warn!(event = "sync_upgrade_required", side = "local", schema);
                return Ok(Step::Done(SyncOutcome::UpgradeRequired { schema }));
            }
            Ok(schema) if schema > LATEST_SCHEMA_REVISION => {
                return Err(SyncError::SchemaIncompatible {
                    found: schema,
                    supported: LATEST_SCHEMA_REVISION,
                });
            }
            Ok(_) => {}
            Err(err) => {
                return self
                    .recover_from_server(local_blob, download, state, err.to_string())
                    .await;
            }
        }
        let merged = match merge_vaults(&local_plain, &server_plain).await {
            Ok(merged) => merged,
            Err(err) => {
                return self
                    .recover_from_server(local_blob, download, state, err.to_string())
                    .await;
            }
        };
        let sealed = self
            .cipher
            .encrypt(&merged.blob, key)
            .map_err(|err| SyncError::Encryption(err.to_string()))?;
        let stored = self
            .store
            .store_encrypted_vault(StoreVaultRequest {
                blob: sealed.clone(),
                mark_dirty: false,
                server_revision: Some(download.current_revision_number),
                expected_mutation_seq: Some(state.mutation_sequence),
                expected_generation: None,
            })
            .await?;
        if !stored.success {
            return Ok(Step::Retry("local vault changed during merge"));
        }

        let step = self
            .upload(
                sealed,
                download.current_revision_number,
                state.mutation_sequence,
            )
            .await?;
        Ok(match step {
            Step::Done(SyncOutcome::Uploaded { revision }) => Step::Done(SyncOutcome::Merged {
                revision,
                stats: merged.stats,
            }),
            other => other,
        })
    }

    async fn adopt(
        &self,
        download: VaultDownload,
        mutation_seq_at_start: i64,
    ) -> Result<Step, SyncError> {
        let revision = download.current_revision_number;
        let stored = self
            .store
            .store_encrypted_vault(StoreVaultRequest {
                blob: download.blob,
                mark_dirty: false,
                server_revision: Some(revision),
                expected_mutation_seq: Some(mutation_seq_at_start),
                expected_generation: None,
            })
            .await?;
        if !stored.success {
            return Ok(Step::Retry("local vault changed during download"));
        }
        tracing::info!(event = "sync_downloaded", revision);
        Ok(Step::Done(SyncOutcome::Downloaded { revision }))
    }

    /// Falls back to the server vault when the local one cannot be merged.
    /// The local blob is kept as the store's recovery copy first.
    async fn recover_from_server(
        &self,
        local_blob: Vec<u8>,
        download: VaultDownload,
        state: &SyncState,
        reason: String,
    ) -> Result<Step, SyncError> {
        tracing::error!(event = "sync_merge_failed", error = %reason);
        self.store.store_recovery_blob(local_blob).await?;
        let revision = download.current_revision_number;
        match self.adopt(download, state.mutation_sequence).await? {
            Step::Done(_) => {}
            retry => return Ok(retry),
        }
        let cleared = self
            .store
            .mark_vault_clean(MarkCleanRequest {
                mutation_seq_at_start: state.mutation_sequence,
                new_server_revision: revision,
            })
            .await?;
        if !cleared {
            return Ok(Step::Retry("local vault changed during recovery"));
        }
        tracing::warn!(event = "sync_recovered_from_server", revision);
        Ok(Step::Done(SyncOutcome::Recovered { revision, reason }))
    }

    fn decrypt(&self, blob: &[u8], key: &SecretKey) -> Result<Vec<u8>, SyncError> {
        self.cipher
            .decrypt(blob, key)
            .map_err(|err| SyncError::Decryption(err.to_string()))
    }

    /// Migrates the local vault to the newest schema and stores it dirty.
    ///
    /// When the server holds a newer revision it is upgraded too and folded
    /// in (merged if the local vault has unsent changes), so the next cycle
    /// simply uploads the result.
    pub async fn upgrade_local_vault(&self) -> Result<i64, SyncError> {
        let key = self
            .store
            .get_encryption_key()
            .await
            .ok_or(SyncError::Locked)?;
        let (blob, state) = self.store.get_vault_with_state().await;
        let blob = blob.ok_or(SyncError::NoLocalVault)?;
        let (local_plain, schema) = upgrade_image(&self.decrypt(&blob, &key)?).await?;

        let mut server_revision = None;
        let mut upgraded = local_plain;
        let status = match self.transport.get_status().await {
            Ok(status) => Some(status),
            Err(TransportError::Unreachable(reason)) => {
                tracing::info!(event = "upgrade_offline", reason = %reason);
                None
            }
            Err(TransportError::Server(reason)) => return Err(SyncError::Network(reason)),
        };
        if let Some(status) = status {
            check_server_version(&status)?;
            self.check_credentials(&status).await?;
            if status.vault_revision > state.server_revision {
                let download = self
                    .transport
                    .get_vault()
                    .await
                    .map_err(|err| SyncError::Network(err.to_string()))?;
                let (server_plain, _) =
                    upgrade_image(&self.decrypt(&download.blob, &key)?).await?;
                upgraded = if state.is_dirty {
                    merge_vaults(&upgraded, &server_plain).await?.blob
                } else {
                    server_plain
                };
                server_revision = Some(download.current_revision_number);
            }
        }

        let sealed = self
            .cipher
            .encrypt(&upgraded, &key)
            .map_err(|err| SyncError::Encryption(err.to_string()))?;
        let stored = self
            .store
            .store_encrypted_vault(StoreVaultRequest {
                blob: sealed,
                mark_dirty: true,
                server_revision,
                expected_mutation_seq: Some(state.mutation_sequence),
                expected_generation: None,
            })
            .await?;
        if !stored.success {
            return Err(StoreError::SequenceMoved.into());
        }
        tracing::info!(event = "local_vault_upgraded", schema);
        Ok(schema)
    }
}

fn check_server_version(status: &ServerStatus) -> Result<(), SyncError> {
    let major = status
        .server_version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .next()
        .and_then(|major| major.parse::<u64>().ok());
    if major == Some(SUPPORTED_SERVER_API_MAJOR) {
        return Ok(());
    }
    Err(SyncError::VersionIncompatible {
        server_version: status.server_version.clone(),
    })
}

async fn image_schema(plain: &[u8]) -> Result<i64, SyncError> {
    let database = VaultDatabase::open_image(plain).await?;
    let schema = database.schema_revision().await;
    database.close().await;
    Ok(schema?)
}

async fn upgrade_image(plain: &[u8]) -> Result<(Vec<u8>, i64), SyncError> {
    let database = VaultDatabase::open_image(plain).await?;
    let upgraded = async {
        let schema = database.upgrade().await?;
        let image = database.export_image().await?;
        Ok::<_, latch_db::ImageError>((image, schema))
    }
    .await;
    database.close().await;
    Ok(upgraded?)
}
