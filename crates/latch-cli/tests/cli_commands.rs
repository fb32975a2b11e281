use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const PASSWORD: &str = "correct horse battery staple";

fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("latch").expect("latch binary");
    cmd.env("LATCH_HOME", home);
    cmd.env("HOME", home);
    cmd.env_remove("LATCH_PASSWORD");
    cmd
}

fn run(home: &Path, args: &[&str]) -> String {
    let output = base_cmd(home)
        .args(["--password", PASSWORD])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).expect("utf8 stdout")
}

fn device(server: &Path, home: &Path) {
    base_cmd(home)
        .args(["init", "--server"])
        .arg(server)
        .assert()
        .success()
        .stdout(predicate::str::contains("server:"));
}

#[test]
fn status_without_vault_reports_none() {
    let home = tempdir().expect("tempdir");
    base_cmd(home.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hasVault\": false"));
}

#[test]
fn create_add_list_and_sync() {
    let root = tempdir().expect("tempdir");
    let server = root.path().join("server");
    let home = root.path().join("laptop");
    device(&server, &home);

    run(&home, &["create"]);
    let id = run(
        &home,
        &["add", "Mail", "--field", "login.username=alice"],
    );
    assert!(!id.trim().is_empty());

    let listed = run(&home, &["list"]);
    assert!(listed.contains("Mail"));
    assert!(listed.contains("login"));

    let shown = run(&home, &["show", id.trim()]);
    assert!(shown.contains("login.username: alice"));

    assert!(run(&home, &["sync"]).contains("uploaded revision 1"));
    assert!(run(&home, &["sync"]).contains("up to date"));
    base_cmd(&home)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"isDirty\": false"));
}

#[test]
fn second_device_downloads_the_vault() {
    let root = tempdir().expect("tempdir");
    let server = root.path().join("server");
    let laptop = root.path().join("laptop");
    let phone = root.path().join("phone");
    device(&server, &laptop);
    run(&laptop, &["create"]);
    run(&laptop, &["add", "Bank"]);
    run(&laptop, &["sync"]);

    device(&server, &phone);
    assert!(run(&phone, &["sync"]).contains("downloaded revision 1"));
    assert!(run(&phone, &["list"]).contains("Bank"));

    run(&phone, &["add", "Shop", "--type", "note"]);
    run(&laptop, &["add", "Mail"]);
    assert!(run(&phone, &["sync"]).contains("uploaded revision 2"));
    assert!(run(&laptop, &["sync"]).contains("merged revision 3"));
    assert!(run(&phone, &["sync"]).contains("downloaded revision 3"));

    let listed = run(&phone, &["list"]);
    for name in ["Bank", "Mail", "Shop"] {
        assert!(listed.contains(name), "{name} missing from {listed}");
    }
}

#[test]
fn wrong_password_cannot_open_a_downloaded_vault() {
    let root = tempdir().expect("tempdir");
    let server = root.path().join("server");
    let laptop = root.path().join("laptop");
    let phone = root.path().join("phone");
    device(&server, &laptop);
    run(&laptop, &["create"]);
    run(&laptop, &["sync"]);

    device(&server, &phone);
    base_cmd(&phone)
        .args(["--password", "not the password", "sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sign in again"));
}

#[test]
fn trash_and_restore_move_items_between_lists() {
    let root = tempdir().expect("tempdir");
    let server = root.path().join("server");
    let home = root.path().join("laptop");
    device(&server, &home);
    run(&home, &["create"]);
    let id = run(&home, &["add", "Old"]);
    let id = id.trim();

    run(&home, &["trash", id]);
    assert!(!run(&home, &["list"]).contains("Old"));
    assert!(run(&home, &["list", "--trashed"]).contains("trashed"));

    run(&home, &["restore", id]);
    assert!(run(&home, &["list"]).contains("Old"));
}

#[test]
fn vault_commands_require_a_password() {
    let root = tempdir().expect("tempdir");
    let server = root.path().join("server");
    let home = root.path().join("laptop");
    device(&server, &home);
    base_cmd(&home)
        .arg("create")
        .assert()
        .failure()
        .stderr(predicate::str::contains("password is required"));
}

#[test]
fn sync_without_server_is_an_error() {
    let home = tempdir().expect("tempdir");
    base_cmd(home.path())
        .args(["--password", PASSWORD, "sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("latch init"));
}

#[test]
fn purge_tolerates_an_oversized_retention_override() {
    let root = tempdir().expect("tempdir");
    let server = root.path().join("server");
    let home = root.path().join("laptop");
    device(&server, &home);
    run(&home, &["create"]);
    let id = run(&home, &["add", "Old"]);
    run(&home, &["trash", id.trim()]);

    base_cmd(&home)
        .env("LATCH_TRASH_RETENTION_DAYS", "999999999999")
        .args(["--password", PASSWORD, "purge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("purged 0"));
}
