#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_raw_string_hashes)]
#![allow(clippy::uninlined_format_args)]

extern crate sqlx_core as sqlx;

use std::path::Path;
use std::time::Duration;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

pub mod image;
pub mod local;
pub mod services;

pub use crate::image::{ImageError, VaultDatabase};
pub use crate::services::ItemStore;

pub type SqlitePool = Pool<Sqlite>;

/// Opens a single-connection pool over a vault image file.
///
/// One connection keeps every statement on the same SQLite handle, which is
/// what `VACUUM INTO` and the per-mutation transactions expect.
pub async fn connect_image(path: &Path, create: bool) -> Result<SqlitePool, sqlx_core::Error> {
    connect_image_with_max(path, create, 1).await
}

pub async fn connect_image_with_max(
    path: &Path,
    create: bool,
    max_connections: u32,
) -> Result<SqlitePool, sqlx_core::Error> {
    let mut options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));
    options = options.foreign_keys(true);

    PoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub async fn migrate_local(pool: &SqlitePool) -> Result<(), sqlx_core::migrate::MigrateError> {
    sqlx_macros::migrate!("./migrations").run(pool).await
}
