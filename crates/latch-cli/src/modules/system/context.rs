use std::sync::Arc;

use latch_crypto::{derive_key, KdfParams, VaultCipher, XChaChaVaultCipher};
use latch_sync::{DirectoryTransport, LocalVaultStore, SyncEngine, SyncTransport, VaultSession};

use super::types::CliConfig;

/// Everything a command may need. The vault is only unlocked by commands
/// that ask for a session or an engine.
pub(crate) struct CommandContext {
    pub config: CliConfig,
    pub store: Arc<LocalVaultStore>,
    pub password: Option<String>,
}

impl CommandContext {
    pub fn cipher(&self) -> Arc<dyn VaultCipher> {
        Arc::new(XChaChaVaultCipher)
    }

    pub fn transport(&self) -> anyhow::Result<DirectoryTransport> {
        let server = self
            .config
            .server_dir
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no server configured, run `latch init --server <dir>`"))?;
        Ok(DirectoryTransport::new(server))
    }

    /// Derives the vault key from the password. The salt comes from the
    /// last derivation on this device, else from the server.
    pub async fn unlock(&self) -> anyhow::Result<()> {
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("password is required (--password or LATCH_PASSWORD)"))?;
        if password.trim().is_empty() {
            anyhow::bail!("password is required");
        }
        let params = match self.store.get_encryption_key_derivation_params().await {
            Some(params) => params,
            None => {
                let status = self.transport()?.get_status().await?;
                KdfParams::argon2id(status.srp_salt)
            }
        };
        let key = derive_key(password, &params)?;
        self.store.set_encryption_key(key, params).await?;
        Ok(())
    }

    pub async fn session(&self) -> anyhow::Result<VaultSession> {
        self.unlock().await?;
        if !self.store.has_vault().await {
            anyhow::bail!("no vault on this device, run `latch create` or `latch sync`");
        }
        Ok(VaultSession::open(self.store.clone(), self.cipher()).await?)
    }

    pub async fn engine(&self) -> anyhow::Result<SyncEngine> {
        self.unlock().await?;
        let transport: Arc<dyn SyncTransport> = Arc::new(self.transport()?);
        Ok(SyncEngine::new(
            transport,
            self.store.clone(),
            self.cipher(),
            self.config.sync.clone(),
        ))
    }
}
