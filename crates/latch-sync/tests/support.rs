#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use latch_core::{ItemInput, ItemType, ServerStatus, UploadRequest, UploadResponse, VaultDownload};
use latch_crypto::{KdfParams, SecretKey, VaultCipher, XChaChaVaultCipher};
use latch_sync::{
    LocalVaultStore, MemoryTransport, SyncEngine, SyncSettings, SyncTransport, TransportError,
    VaultSession,
};

pub const SALT: &str = "c2FsdHNhbHRzYWx0c2FsdA==";

pub struct Device {
    pub store: Arc<LocalVaultStore>,
    pub cipher: Arc<dyn VaultCipher>,
    pub engine: SyncEngine,
}

impl Device {
    pub async fn new(transport: Arc<dyn SyncTransport>, key: &SecretKey) -> Self {
        let store = Arc::new(LocalVaultStore::in_memory());
        store
            .set_encryption_key(key.clone(), KdfParams::argon2id(SALT))
            .await
            .expect("unlock");
        let cipher: Arc<dyn VaultCipher> = Arc::new(XChaChaVaultCipher);
        let engine = SyncEngine::new(
            transport,
            store.clone(),
            cipher.clone(),
            SyncSettings::default(),
        );
        Self {
            store,
            cipher,
            engine,
        }
    }

    pub async fn on(server: &MemoryTransport, key: &SecretKey) -> Self {
        Self::new(Arc::new(server.clone()), key).await
    }

    pub async fn create_vault(&self) -> VaultSession {
        VaultSession::create(self.store.clone(), self.cipher.clone())
            .await
            .expect("create vault")
    }

    pub async fn session(&self) -> VaultSession {
        VaultSession::open(self.store.clone(), self.cipher.clone())
            .await
            .expect("open vault")
    }

    pub async fn add_login(&self, name: &str) {
        let mut session = self.session().await;
        session
            .create_item(ItemInput::new(name, ItemType::Login))
            .await
            .expect("create item");
        session.close().await;
    }

    /// Names of live items, sorted.
    pub async fn item_names(&self) -> Vec<String> {
        let session = self.session().await;
        let mut names: Vec<String> = session
            .items()
            .list_items(false)
            .await
            .expect("list")
            .into_iter()
            .map(|item| item.name)
            .collect();
        session.close().await;
        names.sort();
        names
    }
}

/// Publishes another device's blob right before the first upload it sees,
/// so that upload comes back `Outdated`.
pub struct RacingTransport {
    pub inner: MemoryTransport,
    pub competing_blob: Mutex<Option<Vec<u8>>>,
}

#[async_trait]
impl SyncTransport for RacingTransport {
    async fn get_status(&self) -> Result<ServerStatus, TransportError> {
        self.inner.get_status().await
    }

    async fn get_vault(&self) -> Result<VaultDownload, TransportError> {
        self.inner.get_vault().await
    }

    async fn upload_vault(&self, request: UploadRequest) -> Result<UploadResponse, TransportError> {
        if let Some(blob) = self.competing_blob.lock().await.take() {
            self.inner.publish(blob).await;
        }
        self.inner.upload_vault(request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDuring {
    Upload,
    Download,
}

/// Adds one item to the device's local vault the first time the cycle
/// reaches `during`, the way a user editing mid-sync would.
pub struct EditingTransport {
    pub inner: MemoryTransport,
    pub store: Arc<LocalVaultStore>,
    pub cipher: Arc<dyn VaultCipher>,
    pub during: EditDuring,
    pub edit: Mutex<Option<String>>,
}

impl EditingTransport {
    pub fn new(inner: MemoryTransport, device: &Device, during: EditDuring, name: &str) -> Self {
        Self {
            inner,
            store: device.store.clone(),
            cipher: device.cipher.clone(),
            during,
            edit: Mutex::new(Some(name.to_string())),
        }
    }

    async fn edit_if(&self, phase: EditDuring) {
        if phase != self.during {
            return;
        }
        let Some(name) = self.edit.lock().await.take() else {
            return;
        };
        let mut session = VaultSession::open(self.store.clone(), self.cipher.clone())
            .await
            .expect("open vault");
        session
            .create_item(ItemInput::new(name, ItemType::Login))
            .await
            .expect("racing edit");
        session.close().await;
    }
}

#[async_trait]
impl SyncTransport for EditingTransport {
    async fn get_status(&self) -> Result<ServerStatus, TransportError> {
        self.inner.get_status().await
    }

    async fn get_vault(&self) -> Result<VaultDownload, TransportError> {
        self.edit_if(EditDuring::Download).await;
        self.inner.get_vault().await
    }

    async fn upload_vault(&self, request: UploadRequest) -> Result<UploadResponse, TransportError> {
        let response = self.inner.upload_vault(request).await;
        self.edit_if(EditDuring::Upload).await;
        response
    }
}

/// Holds the first status request until released, so a test can fire a
/// second trigger while a cycle is in flight.
pub struct GatedTransport {
    pub inner: MemoryTransport,
    pub entered: Notify,
    pub release: Notify,
    pub gated: AtomicBool,
    pub status_calls: AtomicUsize,
}

impl GatedTransport {
    pub fn new(inner: MemoryTransport) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
            gated: AtomicBool::new(true),
            status_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SyncTransport for GatedTransport {
    async fn get_status(&self) -> Result<ServerStatus, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.get_status().await
    }

    async fn get_vault(&self) -> Result<VaultDownload, TransportError> {
        self.inner.get_vault().await
    }

    async fn upload_vault(&self, request: UploadRequest) -> Result<UploadResponse, TransportError> {
        self.inner.upload_vault(request).await
    }
}
