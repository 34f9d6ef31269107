//! Command-line behaviour of the `backup` and `restore` binaries.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn backup() -> Command {
    Command::cargo_bin("backup").expect("backup binary")
}

fn restore() -> Command {
    Command::cargo_bin("restore").expect("restore binary")
}

#[test]
fn help_exits_zero() {
    backup()
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("incremental"));
    restore()
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn malformed_invocation_exits_einval() {
    backup().assert().code(libc::EINVAL);
    backup().args(["weekly", "/src", "/dst"]).assert().code(libc::EINVAL);
    backup()
        .args(["full", "/src", "/dst", "verbose"])
        .assert()
        .code(libc::EINVAL);
    backup()
        .args(["full", "/src", "/dst", "override"])
        .assert()
        .code(libc::EINVAL);
    restore().arg("/only-one-path").assert().code(libc::EINVAL);
}

#[test]
fn full_backup_then_restore() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    let store = temp_dir.path().join("store");
    let dst = temp_dir.path().join("restored");
    fs::create_dir_all(src.join("d")).expect("Failed to create src");
    fs::write(src.join("d/file.txt"), "hello").expect("Failed to write file");

    backup()
        .arg("full")
        .arg(&src)
        .arg(&store)
        .args(["create", "full_info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backing up from"))
        .stdout(predicate::str::contains("BACK UP INFORMATION"))
        .stdout(predicate::str::contains("Everything is OK!"))
        .stdout(predicate::str::contains("--> Backup operation completed!"));

    let backups: Vec<_> = fs::read_dir(&store)
        .expect("Failed to list store")
        .map(|e| e.expect("Failed to read entry").path())
        .collect();
    assert_eq!(backups.len(), 1);
    let summary = fs::read_to_string(backups[0].join("type.nt")).expect("Failed to read summary");
    assert!(summary.starts_with("full "));

    restore()
        .arg(&backups[0])
        .arg(&dst)
        .args(["create", "silent"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert_eq!(fs::read_to_string(dst.join("d/file.txt")).expect("Failed to read file"), "hello");
}

#[test]
fn fatal_error_uses_os_code() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    fs::create_dir(&src).expect("Failed to create src");

    backup()
        .arg("full")
        .arg(&src)
        .arg(temp_dir.path().join("missing"))
        .assert()
        .code(libc::ENOENT)
        .stderr(predicate::str::contains("does not exist"));

    backup()
        .arg("incremental")
        .arg(&src)
        .arg(temp_dir.path())
        .arg("silent")
        .env_remove("RUST_LOG")
        .assert()
        .code(libc::ENOENT)
        .stderr(predicate::str::is_empty());
}

#[test]
fn debug_logging_shows_parsed_command_line() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    fs::create_dir(&src).expect("Failed to create src");

    backup()
        .arg("full")
        .arg(&src)
        .arg(temp_dir.path().join("store"))
        .arg("create")
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed command line"));
}
