//! End-to-end tests for `vigil sync` against a directory standing in for a
//! bucket.

use std::fs;
use std::path::{Path, PathBuf};

use vigil_cli::commands::sync::{self, SyncArgs};
use vigil_cli::{ExitCode, LogArgs};

const KEYS: [&str; 3] = [
    "customers/C1/reports/aws/111/2021/05/principals.2021-05-30-0750.csv",
    "customers/C1/reports/aws/111/2021/06/principals.2021-06-08-0755.csv",
    "customers/C1/reports/aws/111/2021/06/resources.2021-06-08-0755.csv",
];

/// A bucket mirror holding [`KEYS`] plus one object of another account.
fn bucket(root: &Path) -> PathBuf {
    let bucket = root.join("bucket");
    let other = "customers/C1/reports/aws/222/2021/06/principals.2021-06-08-0755.csv";
    for key in KEYS.iter().chain(std::iter::once(&other)) {
        let path = bucket.join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("body of {key}")).unwrap();
    }
    bucket
}

fn args(bucket: &Path, dest: &Path, account: &str) -> SyncArgs {
    SyncArgs {
        bucket: Some(bucket.display().to_string()),
        customer_id: "C1".to_string(),
        account: account.to_string(),
        report_home: Some(dest.to_path_buf()),
        concurrency: Some(2),
        dry_run: false,
        log: LogArgs {
            quiet: true,
            ..LogArgs::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Mirroring
// ---------------------------------------------------------------------------

#[test]
fn e2e_sync_mirrors_one_account() {
    let tmp = tempfile::tempdir().unwrap();
    let bucket = bucket(tmp.path());
    let dest = tmp.path().join("mirror");

    assert_eq!(sync::execute(args(&bucket, &dest, "111")).unwrap(), ExitCode::Success);

    for key in KEYS {
        assert_eq!(
            fs::read_to_string(dest.join(key)).unwrap(),
            format!("body of {key}")
        );
    }
    assert!(!dest.join("customers/C1/reports/aws/222").exists());
}

#[test]
fn e2e_sync_dry_run_leaves_empty_files() {
    let tmp = tempfile::tempdir().unwrap();
    let bucket = bucket(tmp.path());
    let dest = tmp.path().join("mirror");

    let mut dry = args(&bucket, &dest, "111");
    dry.dry_run = true;
    assert_eq!(sync::execute(dry).unwrap(), ExitCode::Success);
    for key in KEYS {
        assert_eq!(fs::read_to_string(dest.join(key)).unwrap(), "");
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn e2e_sync_partial_failure_exit_code() {
    let tmp = tempfile::tempdir().unwrap();
    let bucket = bucket(tmp.path());
    let dest = tmp.path().join("mirror");
    // A directory where a file should land makes that one transfer fail.
    fs::create_dir_all(dest.join(KEYS[0])).unwrap();

    assert_eq!(
        sync::execute(args(&bucket, &dest, "111")).unwrap(),
        ExitCode::PartialSync
    );
    assert!(dest.join(KEYS[1]).is_file());
    assert!(dest.join(KEYS[2]).is_file());
    assert!(dest.join(KEYS[0]).is_dir());
}

#[test]
fn e2e_sync_unknown_account_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let bucket = bucket(tmp.path());
    let dest = tmp.path().join("mirror");

    assert_eq!(sync::execute(args(&bucket, &dest, "999")).unwrap(), ExitCode::NotFound);
    assert!(!dest.exists());
}

#[test]
fn e2e_sync_zero_concurrency_still_completes() {
    let tmp = tempfile::tempdir().unwrap();
    let bucket = bucket(tmp.path());
    let dest = tmp.path().join("mirror");

    let mut serial = args(&bucket, &dest, "111");
    serial.concurrency = Some(0);
    assert_eq!(sync::execute(serial).unwrap(), ExitCode::Success);
    assert!(dest.join(KEYS[2]).is_file());
}
