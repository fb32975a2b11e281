use latch_core::system_fields::LOGIN_PASSWORD;
use latch_core::{FieldInput, ItemInput, ItemType, LATEST_SCHEMA_REVISION};
use latch_db::{ImageError, VaultDatabase};

async fn populated() -> VaultDatabase {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let folder = store.create_folder("Work", None).await.expect("folder");
    let mut input = ItemInput::new("Mail", ItemType::Login)
        .with_field(FieldInput::system(LOGIN_PASSWORD, "pw-1"));
    input.folder_id = Some(folder);
    let id = store.create_item(input.clone()).await.expect("create");
    let mut changed = input;
    changed.fields = vec![FieldInput::system(LOGIN_PASSWORD, "pw-2")];
    store.update_item(id, changed).await.expect("update");
    let gone = store
        .create_item(ItemInput::new("Old", ItemType::Note))
        .await
        .expect("create");
    store.permanently_delete_item(gone).await.expect("delete");
    db
}

#[tokio::test]
async fn fresh_vault_reports_latest_revision() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    assert_eq!(
        db.schema_revision().await.expect("revision"),
        LATEST_SCHEMA_REVISION
    );
    assert_eq!(db.upgrade().await.expect("upgrade"), LATEST_SCHEMA_REVISION);
    db.close().await;
}

#[tokio::test]
async fn exported_image_reopens_with_every_row() {
    let db = populated().await;
    let snapshot = db.load_snapshot().await.expect("snapshot");
    let bytes = db.export_image().await.expect("export");
    db.close().await;

    let reopened = VaultDatabase::open_image(&bytes).await.expect("open");
    let reloaded = reopened.load_snapshot().await.expect("snapshot");
    assert_eq!(reloaded, snapshot);
    assert_eq!(reloaded.items.len(), 2);
    assert_eq!(reloaded.field_history.len(), 1);
    reopened.close().await;
}

#[tokio::test]
async fn snapshot_rebuilds_an_identical_vault() {
    let db = populated().await;
    let snapshot = db.load_snapshot().await.expect("snapshot");
    db.close().await;

    let rebuilt = VaultDatabase::from_snapshot(&snapshot)
        .await
        .expect("rebuild");
    assert_eq!(rebuilt.load_snapshot().await.expect("snapshot"), snapshot);
    let live = rebuilt.items().list_items(false).await.expect("list");
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].name, "Mail");
    rebuilt.close().await;
}

#[tokio::test]
async fn garbage_bytes_are_not_a_vault() {
    let err = VaultDatabase::open_image(b"definitely not sqlite")
        .await
        .err()
        .expect("rejected");
    assert!(matches!(err, ImageError::NotAVault(_)));
}

#[tokio::test]
async fn snapshot_with_foreign_revision_is_refused() {
    let db = populated().await;
    let mut snapshot = db.load_snapshot().await.expect("snapshot");
    db.close().await;

    snapshot.schema_revision = LATEST_SCHEMA_REVISION + 1;
    let err = VaultDatabase::from_snapshot(&snapshot)
        .await
        .err()
        .expect("refused");
    assert!(matches!(err, ImageError::SchemaMismatch { .. }));
}
