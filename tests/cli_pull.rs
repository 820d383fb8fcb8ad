//! End-to-end tests of the `adbsync` binary against a stub adb.
//!
//! The stub shell script answers `devices`, serves `shell` commands against
//! a local directory standing in for the device, and implements `pull` with
//! `cp -p`. Everything else is the real binary.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use filetime::FileTime;
use predicates::prelude::*;

const FAKE_ADB: &str = r#"#!/bin/sh
if [ "$1" = "-s" ]; then shift 2; fi
case "$1" in
    devices)
        printf 'List of devices attached\nFAKE123\tdevice model:Stub_Phone\n'
        ;;
    shell)
        shift
        exec sh -c "$1"
        ;;
    pull)
        shift
        if [ "$1" = "-a" ]; then shift; fi
        exec cp -p "$1" "$2"
        ;;
    *)
        exit 1
        ;;
esac
"#;

struct TestEnv {
    temp: tempfile::TempDir,
    adb: PathBuf,
    remote: PathBuf,
    local: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        Self::with_stub(FAKE_ADB)
    }

    fn with_stub(stub: &str) -> Self {
        let temp = tempfile::tempdir().expect("create test dir");
        let adb = temp.path().join("adb");
        fs::write(&adb, stub).expect("write stub adb");
        fs::set_permissions(&adb, fs::Permissions::from_mode(0o755)).expect("chmod stub");

        let remote = temp.path().join("device");
        let local = temp.path().join("backup");
        fs::create_dir_all(&remote).expect("create remote");
        Self {
            temp,
            adb,
            remote,
            local,
        }
    }

    fn remote_file(&self, path: &str, contents: &[u8], mtime: i64) {
        let full = self.remote.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("parent");
        }
        fs::write(&full, contents).expect("write remote file");
        filetime::set_file_mtime(&full, FileTime::from_unix_time(mtime, 0)).expect("mtime");
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("adbsync").expect("binary builds");
        cmd.arg("--adb").arg(&self.adb).arg("--device").arg("FAKE123");
        cmd
    }

    fn cmd_roots(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.arg(&self.remote).arg(&self.local);
        cmd
    }
}

#[test]
fn help_mentions_usage() {
    Command::cargo_bin("adbsync")
        .expect("binary builds")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("REMOTE_ROOT"));
}

#[test]
fn missing_arguments_is_a_config_error() {
    Command::cargo_bin("adbsync")
        .expect("binary builds")
        .assert()
        .code(1);
}

#[test]
fn pulls_a_tree_and_reports_counts() {
    let env = TestEnv::new();
    env.remote_file("DCIM/IMG_1.jpg", b"first photo", 1_700_000_000);
    env.remote_file("DCIM/IMG_2.jpg", b"second photo", 1_700_000_100);

    env.cmd_roots()
        .assert()
        .success()
        .stdout(predicate::str::contains("pulled 2 files"));

    assert_eq!(
        fs::read(env.local.join("DCIM/IMG_1.jpg")).unwrap(),
        b"first photo"
    );
    assert_eq!(
        fs::read(env.local.join("DCIM/IMG_2.jpg")).unwrap(),
        b"second photo"
    );
}

#[test]
fn second_run_pulls_nothing() {
    let env = TestEnv::new();
    env.remote_file("notes.txt", b"hello", 1_700_000_000);

    env.cmd_roots().assert().success();
    env.cmd_roots()
        .assert()
        .success()
        .stdout(predicate::str::contains("pulled 0 files"));
}

#[test]
fn exclude_from_file_is_honoured() {
    let env = TestEnv::new();
    env.remote_file("DCIM/.thumbnails/a.bin", b"junk", 1_700_000_000);
    env.remote_file("DCIM/IMG_1.jpg", b"photo", 1_700_000_001);
    let exclude = env.temp.path().join("exclude.txt");
    fs::write(&exclude, "# thumbnails are regenerated\n.thumbnails/\n").unwrap();

    env.cmd()
        .arg("--exclude-from")
        .arg(&exclude)
        .arg(&env.remote)
        .arg(&env.local)
        .assert()
        .success()
        .stdout(predicate::str::contains("pulled 1 files"));

    assert!(!env.local.join("DCIM/.thumbnails").exists());
}

#[test]
fn inline_exclude_pattern_is_honoured() {
    let env = TestEnv::new();
    env.remote_file("movie.tmp", b"scratch", 1_700_000_000);
    env.remote_file("movie.mp4", b"final", 1_700_000_001);

    env.cmd()
        .arg("--exclude")
        .arg("*.tmp")
        .arg(&env.remote)
        .arg(&env.local)
        .assert()
        .success();

    assert!(env.local.join("movie.mp4").exists());
    assert!(!env.local.join("movie.tmp").exists());
}

#[test]
fn dry_run_leaves_the_target_untouched() {
    let env = TestEnv::new();
    env.remote_file("a.txt", b"a", 1_700_000_000);

    env.cmd_roots()
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("would have pulled 1 files"));

    assert!(!env.local.join("a.txt").exists());
}

#[test]
fn delete_flag_controls_extraneous_removal() {
    let env = TestEnv::new();
    env.remote_file("current.txt", b"now", 1_700_000_000);
    fs::create_dir_all(&env.local).unwrap();
    fs::write(env.local.join("old.txt"), b"stale").unwrap();

    env.cmd_roots().arg("--no-delete").assert().success();
    assert!(env.local.join("old.txt").exists());

    env.cmd_roots().arg("--delete").assert().success();
    assert!(!env.local.join("old.txt").exists());
}

#[test]
fn reference_snapshot_links_unchanged_files() {
    let env = TestEnv::new();
    env.remote_file("photo.jpg", b"image bytes", 1_700_000_000);

    let previous = env.temp.path().join("snapshots/2026-08-01");
    env.cmd().arg(&env.remote).arg(&previous).assert().success();

    env.cmd_roots()
        .arg("--reference")
        .arg(&previous)
        .assert()
        .success()
        .stdout(predicate::str::contains("linked 1"));

    use std::os::unix::fs::MetadataExt;
    let linked = fs::metadata(env.local.join("photo.jpg")).unwrap();
    assert!(linked.nlink() >= 2);
}

#[test]
fn list_devices_prints_the_stub() {
    let env = TestEnv::new();
    Command::cargo_bin("adbsync")
        .expect("binary builds")
        .arg("--adb")
        .arg(&env.adb)
        .arg("--list-devices")
        .assert()
        .success()
        .stdout(predicate::str::contains("FAKE123"));
}

#[test]
fn no_device_without_serial_is_a_transport_error() {
    let empty_stub = r#"#!/bin/sh
if [ "$1" = "devices" ]; then printf 'List of devices attached\n'; exit 0; fi
exit 1
"#;
    let env = TestEnv::with_stub(empty_stub);
    let mut cmd = Command::cargo_bin("adbsync").expect("binary builds");
    cmd.arg("--adb")
        .arg(&env.adb)
        .arg(&env.remote)
        .arg(&env.local)
        .assert()
        .code(2);
}

#[test]
fn failing_pull_exits_with_partial_code() {
    let failing_pull = r#"#!/bin/sh
if [ "$1" = "-s" ]; then shift 2; fi
case "$1" in
    devices)
        printf 'List of devices attached\nFAKE123\tdevice\n'
        ;;
    shell)
        shift
        exec sh -c "$1"
        ;;
    pull)
        echo "remote object vanished" >&2
        exit 1
        ;;
esac
"#;
    let env = TestEnv::with_stub(failing_pull);
    env.remote_file("doomed.bin", b"x", 1_700_000_000);

    env.cmd_roots()
        .assert()
        .code(3)
        .stdout(predicate::str::contains("files failed"));
}

#[test]
fn missing_remote_root_is_a_transport_error() {
    let env = TestEnv::new();
    let mut cmd = env.cmd();
    cmd.arg(env.remote.join("no-such-subdir"))
        .arg(&env.local)
        .assert()
        .code(2);
}
