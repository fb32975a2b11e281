use chrono::Duration;
use latch_core::system_fields::{LOGIN_PASSWORD, LOGIN_URL, LOGIN_USERNAME};
use latch_core::{FieldDefinitionInput, FieldInput, FieldRef, FieldType, ItemInput, ItemType};
use latch_db::VaultDatabase;

fn login(name: &str, username: &str, password: &str) -> ItemInput {
    ItemInput::new(name, ItemType::Login)
        .with_field(FieldInput::system(LOGIN_USERNAME, username))
        .with_field(FieldInput::system(LOGIN_PASSWORD, password))
}

#[tokio::test]
async fn create_item_drops_blank_values_and_keeps_order() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let input = login("Mail", "alice", "pw-1")
        .with_field(FieldInput::system(LOGIN_URL, "https://a.example"))
        .with_field(FieldInput::system(LOGIN_URL, "   "))
        .with_field(FieldInput::system(LOGIN_URL, "https://b.example"));
    let id = store.create_item(input).await.expect("create");

    let detail = store.get_item(id).await.expect("get");
    assert_eq!(detail.name, "Mail");
    assert_eq!(detail.item_type, ItemType::Login);
    assert_eq!(detail.created_at, detail.updated_at);
    assert_eq!(
        detail.values_of(&FieldRef::system(LOGIN_URL)),
        vec!["https://a.example", "https://b.example"]
    );
    assert_eq!(detail.fields.len(), 4);
    db.close().await;
}

#[tokio::test]
async fn update_with_identical_input_changes_nothing() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let id = store
        .create_item(login("Mail", "alice", "pw-1"))
        .await
        .expect("create");
    let before = store.get_item(id).await.expect("get");

    let changed = store
        .update_item(id, login("Mail", "alice", "pw-1"))
        .await
        .expect("update");
    assert!(!changed);
    let after = store.get_item(id).await.expect("get");
    assert_eq!(after.updated_at, before.updated_at);
    db.close().await;
}

#[tokio::test]
async fn update_reconciles_multi_value_fields_by_position() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let url = FieldRef::system(LOGIN_URL);
    let input = ItemInput::new("Site", ItemType::Login)
        .with_field(FieldInput::system(LOGIN_URL, "a"))
        .with_field(FieldInput::system(LOGIN_URL, "b"))
        .with_field(FieldInput::system(LOGIN_URL, "c"));
    let id = store.create_item(input).await.expect("create");
    let before = store.get_item(id).await.expect("get");
    let first_row = before.fields[0].id;

    let update = ItemInput::new("Site", ItemType::Login)
        .with_field(FieldInput::system(LOGIN_URL, "a"))
        .with_field(FieldInput::system(LOGIN_URL, "x"));
    assert!(store.update_item(id, update).await.expect("update"));

    let after = store.get_item(id).await.expect("get");
    assert_eq!(after.values_of(&url), vec!["a", "x"]);
    assert_eq!(after.fields[0].id, first_row);
    assert_eq!(after.fields[0].updated_at, before.fields[0].updated_at);
    assert!(after.updated_at > before.updated_at);

    let snapshot = db.load_snapshot().await.expect("snapshot");
    let deleted = snapshot
        .field_values
        .values()
        .filter(|value| value.is_deleted)
        .count();
    assert_eq!(deleted, 1);
    db.close().await;
}

#[tokio::test]
async fn update_writes_only_changed_item_columns() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let folder = store.create_folder("Work", None).await.expect("folder");
    let id = store
        .create_item(login("Mail", "alice", "pw-1"))
        .await
        .expect("create");

    let mut input = login("Work mail", "alice", "pw-1");
    input.folder_id = Some(folder);
    assert!(store.update_item(id, input).await.expect("update"));

    let detail = store.get_item(id).await.expect("get");
    assert_eq!(detail.name, "Work mail");
    assert_eq!(detail.folder_id, Some(folder));
    db.close().await;
}

#[tokio::test]
async fn trash_and_restore_bump_updated_at() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let id = store
        .create_item(login("Mail", "alice", "pw-1"))
        .await
        .expect("create");
    let created = store.get_item(id).await.expect("get");

    store.trash_item(id).await.expect("trash");
    let trashed = store.get_item(id).await.expect("get");
    assert!(trashed.deleted_at.is_some());
    assert!(trashed.updated_at > created.updated_at);
    assert!(store.list_items(false).await.expect("list").is_empty());
    assert_eq!(store.list_items(true).await.expect("list").len(), 1);

    store.restore_item(id).await.expect("restore");
    let restored = store.get_item(id).await.expect("get");
    assert!(restored.deleted_at.is_none());
    assert!(restored.updated_at > trashed.updated_at);
    assert_eq!(store.list_items(false).await.expect("list").len(), 1);
    db.close().await;
}

#[tokio::test]
async fn permanently_deleted_item_becomes_unrestorable_tombstone() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let logo = store
        .upsert_logo("example.com", Some("image/png".to_string()), Some(vec![1, 2]))
        .await
        .expect("logo");
    let tag = store.create_tag("personal", None).await.expect("tag");
    let mut input = login("Mail", "alice", "pw-1");
    input.logo_id = Some(logo);
    let id = store.create_item(input).await.expect("create");
    store.tag_item(id, tag).await.expect("tag item");
    store
        .add_totp_code(id, "main", "JBSWY3DPEHPK3PXP")
        .await
        .expect("totp");
    store
        .add_attachment(id, "notes.txt", b"hello".to_vec())
        .await
        .expect("attachment");
    store
        .update_item(id, login("Mail", "alice", "pw-2"))
        .await
        .expect("update");

    store.permanently_delete_item(id).await.expect("delete");

    let err = store.restore_item(id).await.expect_err("tombstone restore");
    assert!(err.is("item_tombstoned"));
    assert!(store.get_item(id).await.expect_err("gone").is("item_not_found"));

    let snapshot = db.load_snapshot().await.expect("snapshot");
    let tombstone = snapshot.items.get(&id).expect("tombstone row");
    assert!(tombstone.is_deleted);
    assert!(tombstone.name.is_none());
    assert!(tombstone.item_type.is_none());
    assert!(tombstone.deleted_at.is_some());
    assert!(snapshot.field_values.is_empty());
    assert!(snapshot.field_history.is_empty());
    assert!(snapshot.totp_codes.is_empty());
    assert!(snapshot.attachments.is_empty());
    assert!(snapshot.item_tags.is_empty());
    assert!(snapshot.logos.get(&logo).expect("logo row").is_deleted);
    db.close().await;
}

#[tokio::test]
async fn shared_logo_survives_permanent_delete() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let logo = store
        .upsert_logo("example.com", None, None)
        .await
        .expect("logo");
    assert_eq!(
        store
            .upsert_logo("Example.com", None, None)
            .await
            .expect("logo again"),
        logo
    );
    let mut first = login("One", "a", "1");
    first.logo_id = Some(logo);
    let mut second = login("Two", "b", "2");
    second.logo_id = Some(logo);
    let first = store.create_item(first).await.expect("create");
    store.create_item(second).await.expect("create");

    store.permanently_delete_item(first).await.expect("delete");
    assert!(!store.get_logo(logo).await.expect("logo").is_deleted);
    db.close().await;
}

#[tokio::test]
async fn purge_removes_only_expired_trash() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let trashed = store
        .create_item(login("Old", "a", "1"))
        .await
        .expect("create");
    let kept = store
        .create_item(login("Live", "b", "2"))
        .await
        .expect("create");
    store.trash_item(trashed).await.expect("trash");

    let purged = store
        .purge_expired_trash(Duration::days(30))
        .await
        .expect("purge");
    assert_eq!(purged, 0);

    let purged = store
        .purge_expired_trash(Duration::zero())
        .await
        .expect("purge");
    assert_eq!(purged, 1);
    assert!(store.get_item(trashed).await.is_err());
    assert!(store.get_item(kept).await.is_ok());
    db.close().await;
}

#[tokio::test]
async fn failed_mutation_leaves_vault_untouched() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let single = store
        .create_field_definition(FieldDefinitionInput {
            label: "PIN".to_string(),
            field_type: FieldType::Hidden,
            is_multi_value: false,
            enable_history: false,
        })
        .await
        .expect("definition");
    let input = ItemInput::new("Card", ItemType::CreditCard)
        .with_field(FieldInput::custom(single, "1111"))
        .with_field(FieldInput::custom(single, "2222"));

    let err = store.create_item(input).await.expect_err("multi value");
    assert!(err.is("field_not_multi_value"));

    let unknown = ItemInput::new("Card", ItemType::CreditCard)
        .with_field(FieldInput::custom(uuid::Uuid::now_v7(), "1"));
    let err = store.create_item(unknown).await.expect_err("unknown");
    assert!(err.is("field_definition_not_found"));

    assert!(store.list_items(true).await.expect("list").is_empty());
    let snapshot = db.load_snapshot().await.expect("snapshot");
    assert!(snapshot.items.is_empty());
    assert!(snapshot.field_values.is_empty());
    db.close().await;
}

#[tokio::test]
async fn deleting_folder_detaches_items() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let parent = store.create_folder("Work", None).await.expect("folder");
    let child = store
        .create_folder("Projects", Some(parent))
        .await
        .expect("child");
    let mut input = login("Mail", "alice", "pw");
    input.folder_id = Some(parent);
    let id = store.create_item(input).await.expect("create");

    store.delete_folder(parent).await.expect("delete folder");

    assert_eq!(store.get_item(id).await.expect("get").folder_id, None);
    let folders = store.list_folders().await.expect("folders");
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].id, child);
    assert_eq!(folders[0].parent_folder_id, None);
    db.close().await;
}

#[tokio::test]
async fn tagging_is_idempotent_and_untag_soft_deletes() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let id = store
        .create_item(login("Mail", "alice", "pw"))
        .await
        .expect("create");
    let tag = store
        .create_tag("work", Some("#ff0000".to_string()))
        .await
        .expect("tag");

    assert!(store.tag_item(id, tag).await.expect("tag"));
    assert!(!store.tag_item(id, tag).await.expect("tag again"));
    assert_eq!(store.list_item_tags(id).await.expect("tags").len(), 1);

    assert!(store.untag_item(id, tag).await.expect("untag"));
    assert!(store.list_item_tags(id).await.expect("tags").is_empty());
    let snapshot = db.load_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.item_tags.len(), 1);
    db.close().await;
}

#[tokio::test]
async fn credentials_attach_to_items() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let id = store
        .create_item(login("Mail", "alice", "pw"))
        .await
        .expect("create");
    let passkey = store
        .add_passkey(id, "example.com", vec![7; 16], vec![9; 64])
        .await
        .expect("passkey");
    assert_eq!(store.list_passkeys(id).await.expect("list").len(), 1);
    assert!(store.remove_passkey(passkey).await.expect("remove"));
    assert!(!store.remove_passkey(passkey).await.expect("remove again"));
    assert!(store.list_passkeys(id).await.expect("list").is_empty());
    db.close().await;
}

#[tokio::test]
async fn renaming_folder_bumps_updated_at_only_on_change() {
    let db = VaultDatabase::create_empty().await.expect("vault");
    let store = db.items();
    let id = store.create_folder("Work", None).await.expect("folder");
    let before = store.list_folders().await.expect("folders")[0].clone();

    store.rename_folder(id, "Work").await.expect("same name");
    assert_eq!(store.list_folders().await.expect("folders")[0], before);

    store.rename_folder(id, "  Office ").await.expect("rename");
    let after = store.list_folders().await.expect("folders")[0].clone();
    assert_eq!(after.name, "Office");
    assert!(after.updated_at > before.updated_at);

    let err = store.rename_folder(id, " ").await.expect_err("blank");
    assert!(err.is("invalid_name"));
    db.close().await;
}
