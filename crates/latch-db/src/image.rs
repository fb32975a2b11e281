//! Plaintext vault images: the SQLite file that travels inside the encrypted
//! blob, materialized in a private temp directory while it is being worked on.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use latch_core::{record_set, VaultSnapshot, LATEST_SCHEMA_REVISION, SCHEMA_REVISION_KEY};

use crate::local::{
    AttachmentRepo, FieldDefinitionRepo, FieldHistoryRepo, FieldValueRepo, FolderRepo,
    ItemRepo, ItemTagRepo, LogoRepo, MetadataRepo, PasskeyRepo, TagRepo, TotpCodeRepo,
};
use crate::services::ItemStore;
use crate::{connect_image, migrate_local, SqlitePool};

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
const IMAGE_FILE: &str = "vault.sqlite";

#[derive(Debug)]
pub enum ImageError {
    Io(std::io::Error),
    Database(sqlx_core::Error),
    Migrate(sqlx_core::migrate::MigrateError),
    NotAVault(String),
    SchemaMismatch { found: i64, expected: i64 },
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "vault image io error: {err}"),
            Self::Database(err) => write!(f, "vault image database error: {err}"),
            Self::Migrate(err) => write!(f, "vault image migration failed: {err}"),
            Self::NotAVault(reason) => write!(f, "not a vault image: {reason}"),
            Self::SchemaMismatch { found, expected } => write!(
                f,
                "vault schema revision {found} does not match expected {expected}"
            ),
        }
    }
}

impl std::error::Error for ImageError {}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<sqlx_core::Error> for ImageError {
    fn from(err: sqlx_core::Error) -> Self {
        Self::Database(err)
    }
}

impl From<sqlx_core::migrate::MigrateError> for ImageError {
    fn from(err: sqlx_core::migrate::MigrateError) -> Self {
        Self::Migrate(err)
    }
}

/// An open plaintext vault. The backing file lives as long as this value.
pub struct VaultDatabase {
    pool: SqlitePool,
    path: PathBuf,
    dir: TempDir,
}

impl VaultDatabase {
    /// Fresh vault at the newest schema revision.
    pub async fn create_empty() -> Result<Self, ImageError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(IMAGE_FILE);
        let pool = connect_image(&path, true).await?;
        migrate_local(&pool).await?;
        tracing::debug!(event = "vault_image_created", path = %path.display());
        Ok(Self { pool, path, dir })
    }

    /// Opens a decrypted image without migrating it.
    pub async fn open_image(bytes: &[u8]) -> Result<Self, ImageError> {
        if !bytes.starts_with(SQLITE_HEADER) {
            return Err(ImageError::NotAVault("missing sqlite header".to_string()));
        }
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(IMAGE_FILE);
        tokio::fs::write(&path, bytes).await?;
        let pool = connect_image(&path, false).await?;
        let database = Self { pool, path, dir };
        if let Err(err) = database.schema_revision().await {
            database.close().await;
            return Err(ImageError::NotAVault(err.to_string()));
        }
        tracing::debug!(
            event = "vault_image_opened",
            bytes = bytes.len(),
            path = %database.path.display()
        );
        Ok(database)
    }

    /// Builds a fresh vault holding exactly the rows of `snapshot`.
    pub async fn from_snapshot(snapshot: &VaultSnapshot) -> Result<Self, ImageError> {
        let database = Self::create_empty().await?;
        if let Err(err) = database.write_snapshot(snapshot).await {
            database.close().await;
            return Err(err);
        }
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> ItemStore<'_> {
        ItemStore::new(&self.pool)
    }

    /// Self-contained copy of the current image.
    pub async fn export_image(&self) -> Result<Vec<u8>, ImageError> {
        let target = self
            .dir
            .path()
            .join(format!("export-{}.sqlite", Uuid::now_v7().simple()));
        sqlx_core::query::query::<sqlx_sqlite::Sqlite>("VACUUM INTO ?1")
            .bind(target.to_string_lossy().to_string())
            .execute(&self.pool)
            .await?;
        let bytes = tokio::fs::read(&target).await?;
        tokio::fs::remove_file(&target).await?;
        tracing::debug!(event = "vault_image_exported", bytes = bytes.len());
        Ok(bytes)
    }

    /// Revision recorded in the metadata table; 0 when none was written.
    pub async fn schema_revision(&self) -> Result<i64, ImageError> {
        let mut conn = self.pool.acquire().await?;
        let value = MetadataRepo::new(&mut conn)
            .get_value(SCHEMA_REVISION_KEY)
            .await?;
        match value {
            Some(value) => value
                .parse::<i64>()
                .map_err(|err| ImageError::NotAVault(format!("bad schema revision: {err}"))),
            None => Ok(0),
        }
    }

    /// Applies pending migrations and returns the resulting revision.
    pub async fn upgrade(&self) -> Result<i64, ImageError> {
        let before = self.schema_revision().await?;
        migrate_local(&self.pool).await?;
        let after = self.schema_revision().await?;
        tracing::info!(event = "vault_upgraded", from = before, to = after);
        Ok(after)
    }

    /// Every row of every table, soft-deleted and tombstoned rows included.
    pub async fn load_snapshot(&self) -> Result<VaultSnapshot, ImageError> {
        let schema_revision = self.schema_revision().await?;
        let mut conn = self.pool.acquire().await?;
        Ok(VaultSnapshot {
            schema_revision,
            folders: record_set(FolderRepo::new(&mut conn).list_all().await?),
            logos: record_set(LogoRepo::new(&mut conn).list_all().await?),
            field_definitions: record_set(FieldDefinitionRepo::new(&mut conn).list_all().await?),
            tags: record_set(TagRepo::new(&mut conn).list_all().await?),
            items: record_set(ItemRepo::new(&mut conn).list_all().await?),
            field_values: record_set(FieldValueRepo::new(&mut conn).list_all().await?),
            field_history: record_set(FieldHistoryRepo::new(&mut conn).list_all().await?),
            passkeys: record_set(PasskeyRepo::new(&mut conn).list_all().await?),
            totp_codes: record_set(TotpCodeRepo::new(&mut conn).list_all().await?),
            attachments: record_set(AttachmentRepo::new(&mut conn).list_all().await?),
            item_tags: record_set(ItemTagRepo::new(&mut conn).list_all().await?),
        })
    }

    /// Inserts every row of `snapshot`, parents first, in one transaction.
    /// The target is expected to be empty.
    pub async fn write_snapshot(&self, snapshot: &VaultSnapshot) -> Result<(), ImageError> {
        let current = self.schema_revision().await?;
        if snapshot.schema_revision != current || current != LATEST_SCHEMA_REVISION {
            return Err(ImageError::SchemaMismatch {
                found: snapshot.schema_revision,
                expected: current,
            });
        }
        let mut tx = self.pool.begin().await?;
        for folder in snapshot.folders.values() {
            FolderRepo::new(&mut tx).insert(folder).await?;
        }
        for logo in snapshot.logos.values() {
            LogoRepo::new(&mut tx).insert(logo).await?;
        }
        for definition in snapshot.field_definitions.values() {
            FieldDefinitionRepo::new(&mut tx).insert(definition).await?;
        }
        for tag in snapshot.tags.values() {
            TagRepo::new(&mut tx).insert(tag).await?;
        }
        for item in snapshot.items.values() {
            ItemRepo::new(&mut tx).insert(item).await?;
        }
        for value in snapshot.field_values.values() {
            FieldValueRepo::new(&mut tx).insert(value).await?;
        }
        for history in snapshot.field_history.values() {
            FieldHistoryRepo::new(&mut tx).insert(history).await?;
        }
        for passkey in snapshot.passkeys.values() {
            PasskeyRepo::new(&mut tx).insert(passkey).await?;
        }
        for code in snapshot.totp_codes.values() {
            TotpCodeRepo::new(&mut tx).insert(code).await?;
        }
        for attachment in snapshot.attachments.values() {
            AttachmentRepo::new(&mut tx).insert(attachment).await?;
        }
        for link in snapshot.item_tags.values() {
            ItemTagRepo::new(&mut tx).insert(link).await?;
        }
        tx.commit().await?;
        tracing::debug!(
            event = "vault_snapshot_written",
            records = snapshot.record_count()
        );
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
