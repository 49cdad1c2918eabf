//! Dedup and failure ledger policy

use crate::common::source;
use gleaner::storage::{SqliteStorage, Storage, FAILURE_THRESHOLD};
use gleaner::SourceKind;
use tempfile::TempDir;

const IMAGE: &str = "https://img.test/a.jpg";

fn setup() -> (TempDir, SqliteStorage, i64) {
    let dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("ledger.db")).unwrap();
    let sid = storage
        .upsert_source(&source("landscapes", SourceKind::Unsplash, "landscape", None))
        .unwrap();
    (dir, storage, sid)
}

#[test]
fn test_permanent_after_exactly_three_failures() {
    let (_dir, mut storage, _) = setup();

    assert_eq!(storage.record_failure(IMAGE, "timeout").unwrap(), 1);
    assert!(!storage.is_permanently_failed(IMAGE).unwrap());
    assert_eq!(storage.record_failure(IMAGE, "timeout").unwrap(), 2);
    assert!(!storage.is_permanently_failed(IMAGE).unwrap());
    assert_eq!(
        storage.record_failure(IMAGE, "HTTP 404").unwrap(),
        FAILURE_THRESHOLD
    );
    assert!(storage.is_permanently_failed(IMAGE).unwrap());

    let record = storage.get_failure(IMAGE).unwrap().unwrap();
    assert_eq!(record.last_reason.as_deref(), Some("HTTP 404"));
    assert!(record.is_permanent());
}

#[test]
fn test_reset_clears_permanent_failure() {
    let (_dir, mut storage, _) = setup();
    for _ in 0..3 {
        storage.record_failure(IMAGE, "timeout").unwrap();
    }
    storage.reset_failure(IMAGE).unwrap();

    assert!(!storage.is_permanently_failed(IMAGE).unwrap());
    assert_eq!(storage.record_failure(IMAGE, "timeout").unwrap(), 1);
}

#[test]
fn test_force_skip_is_permanent_immediately() {
    let (_dir, mut storage, _) = setup();
    storage.force_permanent_skip(IMAGE, "watermarked").unwrap();

    assert!(storage.is_permanently_failed(IMAGE).unwrap());
    assert_eq!(storage.count_permanent_failures().unwrap(), 1);
}

#[test]
fn test_record_success_is_idempotent() {
    let (_dir, mut storage, sid) = setup();

    storage.record_success(sid, IMAGE, "post-1").unwrap();
    storage.record_success(sid, IMAGE, "post-2").unwrap();

    assert!(storage.is_already_ingested(IMAGE).unwrap());
    assert_eq!(storage.count_ingested().unwrap(), 1);
    assert!(!storage.is_already_ingested("https://img.test/b.jpg").unwrap());
}
