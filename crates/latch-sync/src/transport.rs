//! The server as the sync core sees it: status, download, upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use latch_core::{ServerStatus, UploadRequest, UploadResponse, UploadStatus, VaultDownload};

const DEFAULT_SERVER_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached; callers with a local vault go offline.
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("server error: {0}")]
    Server(String),
}

#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn get_status(&self) -> Result<ServerStatus, TransportError>;
    async fn get_vault(&self) -> Result<VaultDownload, TransportError>;
    async fn upload_vault(&self, request: UploadRequest) -> Result<UploadResponse, TransportError>;
}

/// Revision bookkeeping shared by every transport: an upload built on an
/// older revision is `Outdated`, anything else becomes the next revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerVault {
    server_version: String,
    srp_salt: String,
    vault_revision: i64,
    #[serde(default)]
    public_email_domain_list: Vec<String>,
    #[serde(default)]
    private_email_domain_list: Vec<String>,
    #[serde(default)]
    hidden_private_email_domain_list: Vec<String>,
}

impl ServerVault {
    fn new(srp_salt: impl Into<String>) -> Self {
        Self {
            server_version: DEFAULT_SERVER_VERSION.to_string(),
            srp_salt: srp_salt.into(),
            ..Self::default()
        }
    }

    fn status(&self) -> ServerStatus {
        ServerStatus {
            server_version: self.server_version.clone(),
            vault_revision: self.vault_revision,
            srp_salt: self.srp_salt.clone(),
        }
    }

    fn download(&self, blob: Vec<u8>) -> VaultDownload {
        VaultDownload {
            blob,
            current_revision_number: self.vault_revision,
            public_email_domain_list: self.public_email_domain_list.clone(),
            private_email_domain_list: self.private_email_domain_list.clone(),
            hidden_private_email_domain_list: self.hidden_private_email_domain_list.clone(),
        }
    }

    /// Returns the response and whether the blob should be stored.
    fn accept(&mut self, request: &UploadRequest) -> (UploadResponse, bool) {
        if request.blob.is_empty() {
            return (
                UploadResponse {
                    success: false,
                    status: UploadStatus::Rejected,
                    new_revision_number: self.vault_revision,
                    mutation_seq_at_start: request.mutation_seq_at_start,
                    error: Some("empty vault blob".to_string()),
                },
                false,
            );
        }
        if request.current_revision_number != self.vault_revision {
            return (
                UploadResponse {
                    success: false,
                    status: UploadStatus::Outdated,
                    new_revision_number: self.vault_revision,
                    mutation_seq_at_start: request.mutation_seq_at_start,
                    error: None,
                },
                false,
            );
        }
        self.vault_revision += 1;
        (
            UploadResponse {
                success: true,
                status: UploadStatus::Accepted,
                new_revision_number: self.vault_revision,
                mutation_seq_at_start: request.mutation_seq_at_start,
                error: None,
            },
            true,
        )
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    vault: ServerVault,
    blob: Vec<u8>,
    offline: bool,
    uploads: usize,
}

/// In-process server. Clones share state, so several engines can talk to one
/// instance the way several devices talk to one account.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new(srp_salt: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                vault: ServerVault::new(srp_salt),
                ..MemoryState::default()
            })),
        }
    }

    pub async fn set_online(&self, online: bool) {
        self.state.lock().await.offline = !online;
    }

    pub async fn set_salt(&self, srp_salt: impl Into<String>) {
        self.state.lock().await.vault.srp_salt = srp_salt.into();
    }

    pub async fn set_server_version(&self, version: impl Into<String>) {
        self.state.lock().await.vault.server_version = version.into();
    }

    pub async fn set_email_domains(&self, public: Vec<String>, private: Vec<String>) {
        let mut state = self.state.lock().await;
        state.vault.public_email_domain_list = public;
        state.vault.private_email_domain_list = private;
    }

    /// Puts the server back to an older revision and blob.
    pub async fn restore_backup(&self, revision: i64, blob: Vec<u8>) {
        let mut state = self.state.lock().await;
        state.vault.vault_revision = revision;
        state.blob = blob;
    }

    /// Replaces the stored blob and bumps the revision as if another client
    /// uploaded it.
    pub async fn publish(&self, blob: Vec<u8>) -> i64 {
        let mut state = self.state.lock().await;
        state.vault.vault_revision += 1;
        state.blob = blob;
        state.vault.vault_revision
    }

    pub async fn revision(&self) -> i64 {
        self.state.lock().await.vault.vault_revision
    }

    pub async fn blob(&self) -> Vec<u8> {
        self.state.lock().await.blob.clone()
    }

    pub async fn upload_count(&self) -> usize {
        self.state.lock().await.uploads
    }

    fn check_online(state: &MemoryState) -> Result<(), TransportError> {
        if state.offline {
            return Err(TransportError::Unreachable("memory server offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncTransport for MemoryTransport {
    async fn get_status(&self) -> Result<ServerStatus, TransportError> {
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        Ok(state.vault.status())
    }

    async fn get_vault(&self) -> Result<VaultDownload, TransportError> {
        let state = self.state.lock().await;
        Self::check_online(&state)?;
        Ok(state.vault.download(state.blob.clone()))
    }

    async fn upload_vault(&self, request: UploadRequest) -> Result<UploadResponse, TransportError> {
        let mut state = self.state.lock().await;
        Self::check_online(&state)?;
        state.uploads += 1;
        let (response, store) = state.vault.accept(&request);
        if store {
            state.blob = request.blob;
        }
        Ok(response)
    }
}

const STATUS_FILENAME: &str = "status.json";
const VAULT_FILENAME: &str = "vault.blob";

/// A shared directory acting as the server: `status.json` holds the revision
/// and salt, `vault.blob` the encrypted vault. A missing directory reads as
/// an unreachable server.
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates an empty server directory with the given salt. An existing
    /// server directory is left as it is.
    pub async fn init(root: impl Into<PathBuf>, srp_salt: &str) -> Result<Self, TransportError> {
        let transport = Self::new(root);
        tokio::fs::create_dir_all(&transport.root)
            .await
            .map_err(|err| TransportError::Server(format!("create server dir: {err}")))?;
        if !tokio::fs::try_exists(transport.status_path())
            .await
            .unwrap_or(false)
        {
            transport.write_status(&ServerVault::new(srp_salt)).await?;
            tracing::info!(event = "server_dir_initialized", root = %transport.root.display());
        }
        Ok(transport)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILENAME)
    }

    async fn read_status(&self) -> Result<ServerVault, TransportError> {
        let contents = tokio::fs::read_to_string(self.status_path())
            .await
            .map_err(|err| {
                TransportError::Unreachable(format!("{}: {err}", self.root.display()))
            })?;
        serde_json::from_str(&contents)
            .map_err(|err| TransportError::Server(format!("invalid status file: {err}")))
    }

    async fn write_status(&self, vault: &ServerVault) -> Result<(), TransportError> {
        let contents = serde_json::to_string_pretty(vault)
            .map_err(|err| TransportError::Server(format!("encode status: {err}")))?;
        write_atomic(&self.status_path(), contents.as_bytes()).await
    }

    async fn read_blob(&self) -> Result<Vec<u8>, TransportError> {
        match tokio::fs::read(self.root.join(VAULT_FILENAME)).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(TransportError::Server(format!("read vault: {err}"))),
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TransportError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|err| TransportError::Server(format!("write {}: {err}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| TransportError::Server(format!("rename {}: {err}", path.display())))
}

#[async_trait]
impl SyncTransport for DirectoryTransport {
    async fn get_status(&self) -> Result<ServerStatus, TransportError> {
        Ok(self.read_status().await?.status())
    }

    async fn get_vault(&self) -> Result<VaultDownload, TransportError> {
        let _guard = self.lock.lock().await;
        let vault = self.read_status().await?;
        let blob = self.read_blob().await?;
        Ok(vault.download(blob))
    }

    async fn upload_vault(&self, request: UploadRequest) -> Result<UploadResponse, TransportError> {
        let _guard = self.lock.lock().await;
        let mut vault = self.read_status().await?;
        let (response, store) = vault.accept(&request);
        if store {
            write_atomic(&self.root.join(VAULT_FILENAME), &request.blob).await?;
            self.write_status(&vault).await?;
            tracing::debug!(
                event = "server_dir_vault_stored",
                revision = vault.vault_revision
            );
        }
        Ok(response)
    }
}
