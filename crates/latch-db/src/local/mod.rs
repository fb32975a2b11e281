macro_rules! query {
    ($sql:expr $(, $arg:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut q = sqlx_core::query::query::<sqlx_sqlite::Sqlite>($sql);
        $(q = q.bind($arg);)*
        q
    }};
}

macro_rules! query_as {
    ($ty:ty, $sql:expr $(, $arg:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut q = sqlx_core::query_as::query_as::<sqlx_sqlite::Sqlite, $ty>($sql);
        $(q = q.bind($arg);)*
        q
    }};
}

mod credential_repo;
mod field_definition_repo;
mod field_history_repo;
mod field_value_repo;
mod folder_repo;
mod item_repo;
mod logo_repo;
mod metadata_repo;
mod tag_repo;

pub use credential_repo::{AttachmentRepo, PasskeyRepo, TotpCodeRepo};
pub use field_definition_repo::FieldDefinitionRepo;
pub use field_history_repo::{FieldHistoryRepo, HistoryOrder};
pub use field_value_repo::FieldValueRepo;
pub use folder_repo::FolderRepo;
pub use item_repo::{ItemChanges, ItemRepo};
pub use logo_repo::LogoRepo;
pub use metadata_repo::MetadataRepo;
pub use tag_repo::{ItemTagRepo, TagRepo};
