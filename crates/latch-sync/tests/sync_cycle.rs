use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use latch_core::{
    ItemInput, ItemType, StoreVaultRequest, LATEST_SCHEMA_REVISION, SCHEMA_REVISION_KEY,
};
use latch_crypto::{SecretKey, VaultCipher, XChaChaVaultCipher};
use latch_db::local::MetadataRepo;
use latch_db::VaultDatabase;
use latch_sync::{MemoryTransport, SyncEngine, SyncError, SyncOutcome, SyncSettings, SyncTransport};

mod support;

use support::{Device, EditDuring, EditingTransport, GatedTransport, RacingTransport, SALT};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

/// Engine over `transport` that gives up after a single attempt.
fn single_attempt_engine(device: &Device, transport: Arc<dyn SyncTransport>) -> SyncEngine {
    SyncEngine::new(
        transport,
        device.store.clone(),
        device.cipher.clone(),
        SyncSettings {
            max_attempts: 1,
            ..SyncSettings::default()
        },
    )
}

async fn store_dirty(device: &Device, blob: Vec<u8>) {
    device
        .store
        .store_encrypted_vault(StoreVaultRequest {
            blob,
            mark_dirty: true,
            ..StoreVaultRequest::default()
        })
        .await
        .expect("store");
}

#[tokio::test]
async fn first_device_uploads_and_second_downloads() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.add_login("Mail").await;

    let outcome = laptop.engine.request_sync().await.expect("sync");
    assert_eq!(outcome, SyncOutcome::Uploaded { revision: 1 });
    let state = laptop.store.get_sync_state().await;
    assert!(!state.is_dirty);
    assert_eq!(state.server_revision, 1);

    let phone = Device::on(&server, &key).await;
    let outcome = phone.engine.request_sync().await.expect("sync");
    assert_eq!(outcome, SyncOutcome::Downloaded { revision: 1 });
    assert_eq!(phone.item_names().await, vec!["Mail".to_string()]);

    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::NoChanges
    );
}

#[tokio::test]
async fn concurrent_edits_on_two_devices_converge() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");

    laptop.add_login("Bank").await;
    phone.add_login("Shop").await;

    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Uploaded { revision: 2 }
    );
    match phone.engine.request_sync().await.expect("sync") {
        SyncOutcome::Merged { revision, stats } => {
            assert_eq!(revision, 3);
            assert_eq!(stats.records_created_locally, 1);
            assert!(stats.records_from_server >= 1);
        }
        other => panic!("expected merge, got {other:?}"),
    }
    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Downloaded { revision: 3 }
    );

    let expected = vec!["Bank".to_string(), "Shop".to_string()];
    assert_eq!(laptop.item_names().await, expected);
    assert_eq!(phone.item_names().await, expected);
    assert!(!phone.store.get_sync_state().await.is_dirty);
}

#[tokio::test]
async fn outdated_upload_refetches_and_merges() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");

    let racing = Arc::new(RacingTransport {
        inner: server.clone(),
        competing_blob: Mutex::new(None),
    });
    let phone = Device::new(racing.clone(), &key).await;
    phone.engine.request_sync().await.expect("sync");

    laptop.add_login("Bank").await;
    let laptop_blob = laptop.store.get_encrypted_vault().await.expect("blob");
    *racing.competing_blob.lock().await = Some(laptop_blob);
    phone.add_login("Shop").await;

    let uploads_before = server.upload_count().await;
    let outcome = phone.engine.request_sync().await.expect("sync");
    assert!(matches!(outcome, SyncOutcome::Merged { revision: 3, .. }));
    assert_eq!(server.upload_count().await - uploads_before, 2);
    assert_eq!(
        phone.item_names().await,
        vec!["Bank".to_string(), "Shop".to_string()]
    );
}

#[tokio::test]
async fn unreachable_server_falls_back_to_offline() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    server.set_online(false).await;

    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Offline
    );
    let metadata = laptop.store.metadata().await;
    assert!(metadata.is_offline);
    assert!(metadata.is_dirty);

    let fresh = Device::on(&server, &key).await;
    assert!(matches!(
        fresh.engine.request_sync().await,
        Err(SyncError::Network(_))
    ));

    server.set_online(true).await;
    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Uploaded { revision: 1 }
    );
    assert!(!laptop.store.metadata().await.is_offline);
}

#[tokio::test]
async fn changed_salt_forces_logout() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    server.set_salt("bmV3c2FsdG5ld3NhbHRuZXc=").await;

    assert!(matches!(
        laptop.engine.request_sync().await,
        Err(SyncError::AuthenticationInvalidated)
    ));
    assert!(!laptop.store.has_vault().await);
    assert!(laptop.store.get_encryption_key().await.is_none());
}

#[tokio::test]
async fn unsupported_server_version_is_an_error() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    server.set_server_version("2.0.0").await;

    assert!(matches!(
        laptop.engine.request_sync().await,
        Err(SyncError::VersionIncompatible { .. })
    ));
    assert!(laptop.store.get_sync_state().await.is_dirty);
}

#[tokio::test]
async fn undecryptable_server_vault_leaves_local_untouched() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    laptop.add_login("Mail").await;
    let before = laptop.store.get_vault_with_state().await;

    let foreign = XChaChaVaultCipher
        .encrypt(b"SQLite format 3\0", &SecretKey::generate())
        .expect("encrypt");
    server.publish(foreign).await;

    assert!(matches!(
        laptop.engine.request_sync().await,
        Err(SyncError::Decryption(_))
    ));
    assert_eq!(laptop.store.get_vault_with_state().await, before);
}

#[tokio::test]
async fn corrupt_server_image_keeps_local_dirty() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    laptop.add_login("Mail").await;
    let before = laptop.store.get_vault_with_state().await;

    let garbage = XChaChaVaultCipher
        .encrypt(b"not a vault", &key)
        .expect("encrypt");
    server.publish(garbage).await;

    assert!(laptop.engine.request_sync().await.is_err());
    let after = laptop.store.get_vault_with_state().await;
    assert_eq!(after, before);
    assert!(after.1.is_dirty);
}

#[tokio::test]
async fn server_restored_from_backup_receives_the_local_vault() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let backup = server.blob().await;
    laptop.add_login("Mail").await;
    laptop.engine.request_sync().await.expect("sync");
    assert_eq!(server.revision().await, 2);

    server.restore_backup(1, backup).await;
    laptop.add_login("Bank").await;
    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Uploaded { revision: 2 }
    );

    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");
    assert_eq!(
        phone.item_names().await,
        vec!["Bank".to_string(), "Mail".to_string()]
    );
}

#[tokio::test]
async fn trigger_during_a_running_cycle_is_coalesced() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let gate = Arc::new(GatedTransport::new(server.clone()));
    let transport: Arc<dyn SyncTransport> = gate.clone();
    let laptop = Device::new(transport, &key).await;
    laptop.create_vault().await.close().await;

    let (first, second) = tokio::join!(laptop.engine.request_sync(), async {
        gate.entered.notified().await;
        let outcome = laptop.engine.request_sync().await;
        gate.release.notify_one();
        outcome
    });

    assert_eq!(first.expect("sync"), SyncOutcome::Uploaded { revision: 1 });
    assert_eq!(second.expect("sync"), SyncOutcome::Coalesced);
    assert_eq!(gate.status_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn locked_store_refuses_to_sync() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.store.lock().await;

    assert!(matches!(
        laptop.engine.request_sync().await,
        Err(SyncError::Locked)
    ));
}

#[tokio::test]
async fn upgrade_marks_the_local_vault_dirty() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let before = laptop.store.get_sync_state().await;

    let schema = laptop.engine.upgrade_local_vault().await.expect("upgrade");
    assert_eq!(schema, LATEST_SCHEMA_REVISION);
    let after = laptop.store.get_sync_state().await;
    assert!(after.is_dirty);
    assert_eq!(after.mutation_sequence, before.mutation_sequence + 1);
}

#[tokio::test]
async fn upgrade_works_offline_but_honours_server_checks() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");

    server.set_online(false).await;
    assert_eq!(
        laptop.engine.upgrade_local_vault().await.expect("upgrade"),
        LATEST_SCHEMA_REVISION
    );

    server.set_online(true).await;
    server.set_server_version("2.0.0").await;
    assert!(matches!(
        laptop.engine.upgrade_local_vault().await,
        Err(SyncError::VersionIncompatible { .. })
    ));

    server.set_server_version("1.0.0").await;
    server.set_salt("bmV3c2FsdG5ld3NhbHRuZXc=").await;
    assert!(matches!(
        laptop.engine.upgrade_local_vault().await,
        Err(SyncError::AuthenticationInvalidated)
    ));
    assert!(!laptop.store.has_vault().await);
}

#[tokio::test]
async fn open_session_reloads_after_download() {
    let server = MemoryTransport::new(SALT);
    server
        .set_email_domains(vec!["example.com".to_string()], vec!["me.example".to_string()])
        .await;
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");

    let mut session = phone.session().await;
    assert!(session.items().list_items(false).await.expect("list").is_empty());

    laptop.add_login("Mail").await;
    laptop.engine.request_sync().await.expect("sync");
    let outcome = phone.engine.request_sync().await.expect("sync");
    assert!(outcome.brought_new_data());

    session.reload().await.expect("reload");
    let items = session.items().list_items(false).await.expect("list");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Mail");
    session.close().await;

    let domains = phone.store.email_domains().await;
    assert_eq!(domains.public, vec!["example.com".to_string()]);
    assert_eq!(domains.private, vec!["me.example".to_string()]);
}

#[tokio::test]
async fn edit_in_a_session_opened_before_a_download_keeps_both_sides() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");

    let mut session = phone.session().await;
    laptop.add_login("FromLaptop").await;
    laptop.engine.request_sync().await.expect("sync");
    assert_eq!(
        phone.engine.request_sync().await.expect("sync"),
        SyncOutcome::Downloaded { revision: 2 }
    );

    session
        .create_item(ItemInput::new("FromPhone", ItemType::Login))
        .await
        .expect("create item");
    let mut visible: Vec<String> = session
        .items()
        .list_items(false)
        .await
        .expect("list")
        .into_iter()
        .map(|item| item.name)
        .collect();
    visible.sort();
    assert_eq!(visible, names(&["FromLaptop", "FromPhone"]));
    session.close().await;

    assert_eq!(
        phone.engine.request_sync().await.expect("sync"),
        SyncOutcome::Uploaded { revision: 3 }
    );
    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Downloaded { revision: 3 }
    );
    assert_eq!(
        laptop.item_names().await,
        names(&["FromLaptop", "FromPhone"])
    );
}

#[tokio::test]
async fn abandoned_sync_does_not_block_later_cycles() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let gate = Arc::new(GatedTransport::new(server.clone()));
    let transport: Arc<dyn SyncTransport> = gate.clone();
    let laptop = Device::new(transport, &key).await;
    laptop.create_vault().await.close().await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), laptop.engine.request_sync()).await;
    assert!(abandoned.is_err());

    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Uploaded { revision: 1 }
    );
    assert!(!laptop.store.get_sync_state().await.is_dirty);
}

#[tokio::test]
async fn unmergeable_local_vault_is_kept_and_server_adopted() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");

    laptop.add_login("Mail").await;
    laptop.engine.request_sync().await.expect("sync");
    let broken = XChaChaVaultCipher
        .encrypt(b"not a vault", &key)
        .expect("encrypt");
    store_dirty(&phone, broken.clone()).await;

    match phone.engine.request_sync().await.expect("sync") {
        SyncOutcome::Recovered { revision, .. } => assert_eq!(revision, 2),
        other => panic!("expected recovery, got {other:?}"),
    }
    assert_eq!(phone.store.get_recovery_blob().await, Some(broken));
    let state = phone.store.get_sync_state().await;
    assert!(!state.is_dirty);
    assert_eq!(state.server_revision, 2);
    assert_eq!(phone.item_names().await, names(&["Mail"]));
    assert_eq!(
        phone.engine.request_sync().await.expect("sync"),
        SyncOutcome::NoChanges
    );
}

#[tokio::test]
async fn dirty_local_vault_on_old_schema_requires_upgrade() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");
    laptop.add_login("Mail").await;
    laptop.engine.request_sync().await.expect("sync");

    let db = VaultDatabase::create_empty().await.expect("vault");
    db.items()
        .create_item(ItemInput::new("Legacy", ItemType::Login))
        .await
        .expect("item");
    {
        let mut conn = db.pool().acquire().await.expect("connection");
        MetadataRepo::new(&mut conn)
            .set_value(SCHEMA_REVISION_KEY, "0")
            .await
            .expect("backdate schema");
    }
    let image = db.export_image().await.expect("export");
    db.close().await;
    store_dirty(&phone, XChaChaVaultCipher.encrypt(&image, &key).expect("encrypt")).await;
    let before = phone.store.get_vault_with_state().await;

    assert_eq!(
        phone.engine.request_sync().await.expect("sync"),
        SyncOutcome::UpgradeRequired { schema: 0 }
    );
    assert_eq!(phone.store.get_vault_with_state().await, before);
    assert!(phone.store.get_recovery_blob().await.is_none());
}

#[tokio::test]
async fn edit_racing_an_upload_stays_dirty_and_reaches_the_server() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.add_login("Mail").await;
    let before = laptop.store.get_sync_state().await;

    let editing = Arc::new(EditingTransport::new(
        server.clone(),
        &laptop,
        EditDuring::Upload,
        "Racing",
    ));
    let engine = single_attempt_engine(&laptop, editing);
    assert!(matches!(
        engine.request_sync().await,
        Err(SyncError::RetriesExhausted { attempts: 1 })
    ));
    let state = laptop.store.get_sync_state().await;
    assert!(state.is_dirty);
    assert_eq!(state.mutation_sequence, before.mutation_sequence + 1);
    assert_eq!(state.server_revision, 0);
    assert_eq!(server.revision().await, 1);

    assert!(matches!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Merged { revision: 2, .. }
    ));
    assert!(!laptop.store.get_sync_state().await.is_dirty);
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");
    assert_eq!(phone.item_names().await, names(&["Mail", "Racing"]));
}

#[tokio::test]
async fn edit_racing_a_merge_is_not_overwritten() {
    let server = MemoryTransport::new(SALT);
    let key = SecretKey::generate();
    let laptop = Device::on(&server, &key).await;
    laptop.create_vault().await.close().await;
    laptop.engine.request_sync().await.expect("sync");
    let phone = Device::on(&server, &key).await;
    phone.engine.request_sync().await.expect("sync");
    laptop.add_login("Laptop").await;
    laptop.engine.request_sync().await.expect("sync");
    phone.add_login("Phone").await;
    let before = phone.store.get_sync_state().await;

    let editing = Arc::new(EditingTransport::new(
        server.clone(),
        &phone,
        EditDuring::Download,
        "Racing",
    ));
    let engine = single_attempt_engine(&phone, editing);
    assert!(matches!(
        engine.request_sync().await,
        Err(SyncError::RetriesExhausted { attempts: 1 })
    ));
    let state = phone.store.get_sync_state().await;
    assert!(state.is_dirty);
    assert_eq!(state.mutation_sequence, before.mutation_sequence + 1);
    assert_eq!(state.server_revision, 1);
    assert_eq!(server.revision().await, 2);
    assert_eq!(phone.item_names().await, names(&["Phone", "Racing"]));

    assert!(matches!(
        phone.engine.request_sync().await.expect("sync"),
        SyncOutcome::Merged { revision: 3, .. }
    ));
    assert_eq!(
        laptop.engine.request_sync().await.expect("sync"),
        SyncOutcome::Downloaded { revision: 3 }
    );
    assert_eq!(
        laptop.item_names().await,
        names(&["Laptop", "Phone", "Racing"])
    );
}
