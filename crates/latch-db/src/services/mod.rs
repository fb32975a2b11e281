use sqlx_core::transaction::Transaction;
use sqlx_sqlite::{Sqlite, SqliteConnection};
use uuid::Uuid;

use latch_core::{Item, ServiceError, ServiceResult};

use crate::local::ItemRepo;
use crate::SqlitePool;

mod catalog;
mod credentials;
mod history;
mod items;

/// Entity store over one open vault image. Every public operation runs in its
/// own transaction and leaves the vault untouched when it fails.
pub struct ItemStore<'a> {
    pool: &'a SqlitePool,
}

pub(crate) fn db_error(err: sqlx_core::Error) -> ServiceError {
    ServiceError::new("db_error", err.to_string())
}

impl<'a> ItemStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> ServiceResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(db_error)
    }

    async fn commit(tx: Transaction<'static, Sqlite>) -> ServiceResult<()> {
        tx.commit().await.map_err(db_error)
    }

    /// Loads an item that may still be edited: present and not tombstoned.
    async fn load_mutable_item(conn: &mut SqliteConnection, id: Uuid) -> ServiceResult<Item> {
        let item = ItemRepo::new(conn)
            .get(id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ServiceError::not_found("item_not_found", id))?;
        if item.is_tombstone() {
            return Err(ServiceError::new(
                "item_tombstoned",
                format!("{id} was permanently deleted"),
            ));
        }
        Ok(item)
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::new("invalid_name", "name must not be empty"));
    }
    Ok(name.to_string())
}
