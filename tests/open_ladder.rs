//! Open fallbacks, sized opens and the empty-file policy.

use std::fs;

use mmap_edit::{ErrorKind, MapOptions, OpenHow};

mod common;
use common::{disk_len, tmp_path, FaultyBackend};

#[test]
fn read_write_failure_falls_back_to_read_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "ro_fallback.bin");
    fs::write(&path, b"guarded").expect("seed");

    let backend = FaultyBackend::default();
    backend.faults.open.borrow_mut().push(OpenHow::ReadWriteCreate);
    let mut file = MapOptions::new().open_with(&path, backend).expect("open");

    assert!(!file.is_read_write());
    assert_eq!(file.region(), b"guarded");
    assert_eq!(
        file.resize(1).expect_err("read-only").kind(),
        ErrorKind::ReadOnlyViolation
    );
}

#[test]
fn last_resort_is_exclusive_create() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "excl.bin");

    let backend = FaultyBackend::default();
    backend
        .faults
        .open
        .borrow_mut()
        .extend([OpenHow::ReadWriteCreate, OpenHow::ReadOnly]);
    let file = MapOptions::new().open_with(&path, backend).expect("open");

    assert!(file.is_read_write());
    assert_eq!(file.size(), 0);
    assert!(path.exists());
}

#[test]
fn every_attempt_failing_is_open_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "none.bin");

    let backend = FaultyBackend::default();
    backend.faults.open.borrow_mut().extend([
        OpenHow::ReadWriteCreate,
        OpenHow::ReadOnly,
        OpenHow::CreateExclusive,
    ]);
    let err = MapOptions::new()
        .open_with(&path, backend)
        .expect_err("nothing opens");
    assert_eq!(err.kind(), ErrorKind::OpenFailed);
    assert!(!path.exists());
}

#[test]
fn read_only_intent_has_no_fallback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "ro_only.bin");
    fs::write(&path, b"x").expect("seed");

    let backend = FaultyBackend::default();
    backend.faults.open.borrow_mut().push(OpenHow::ReadOnly);
    let err = MapOptions::new()
        .read_only()
        .open_with(&path, backend)
        .expect_err("no fallback");
    assert_eq!(err.kind(), ErrorKind::OpenFailed);
}

#[test]
fn stat_failure_is_access_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "stat.bin");
    fs::write(&path, b"abc").expect("seed");

    let backend = FaultyBackend::default();
    backend.faults.stat.set(true);
    let err = MapOptions::new()
        .open_with(&path, backend)
        .expect_err("stat fails");
    assert_eq!(err.kind(), ErrorKind::AccessFailed);
    assert_eq!(fs::read(&path).expect("untouched"), b"abc");
}

#[test]
fn map_failure_is_map_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "map.bin");
    fs::write(&path, b"abc").expect("seed");

    let backend = FaultyBackend::default();
    backend.faults.map.set(true);
    let err = MapOptions::new()
        .open_with(&path, backend)
        .expect_err("map fails");
    assert_eq!(err.kind(), ErrorKind::MapFailed);
    assert!(path.exists());
}

#[test]
fn sized_open_creates_exact_length() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "sized.bin");

    let file = MapOptions::new()
        .permissions(0o600)
        .initial_size(10_000)
        .open(&path)
        .expect("open");
    assert_eq!(file.size(), 10_000);
    assert_eq!(file.region().len(), 10_000);
    assert_eq!(disk_len(&path), 10_000);
    assert_eq!(file.permissions(), 0o600);
    #[cfg(unix)]
    assert_eq!(file.stat().map(|s| s.permissions & 0o777), Some(0o600));
}

#[test]
fn sized_open_accepts_existing_empty_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "empty.bin");
    fs::write(&path, b"").expect("seed");

    let file = MapOptions::new().initial_size(64).open(&path).expect("open");
    assert_eq!(file.size(), 64);
    assert!(file.is_read_write());
}

#[test]
fn sized_open_refuses_non_empty_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "full.bin");
    fs::write(&path, b"precious").expect("seed");

    let err = MapOptions::new()
        .initial_size(64)
        .open(&path)
        .expect_err("must refuse");
    assert_eq!(err.kind(), ErrorKind::ResizeRefused);
    assert_eq!(fs::read(&path).expect("untouched"), b"precious");
}

#[test]
fn failed_sized_open_removes_created_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "doomed.bin");

    let backend = FaultyBackend::default();
    backend.faults.map.set(true);
    let err = MapOptions::new()
        .initial_size(4096)
        .open_with(&path, backend)
        .expect_err("map fails");
    assert_eq!(err.kind(), ErrorKind::MapFailed);
    assert!(!path.exists());
}

#[test]
fn empty_file_policy_is_the_callers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = tmp_path(&dir, "void.bin");
    fs::write(&path, b"").expect("seed");

    let file = MapOptions::new().open(&path).expect("accepting");
    assert_eq!(file.size(), 0);
    drop(file);

    let err = MapOptions::new()
        .require_non_empty(true)
        .open(&path)
        .expect_err("refusing");
    assert_eq!(err.kind(), ErrorKind::EmptyFile);
    assert!(path.exists());
}
