//! Crawl frontier behavior against an on-disk database

use crate::common::source;
use gleaner::storage::{NewFrontierItem, SqliteStorage, Storage};
use gleaner::{QueueStatus, SourceKind};
use tempfile::TempDir;

fn open(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&dir.path().join("frontier.db")).expect("open database")
}

fn item(url: &str, source_id: i64, priority: i64) -> NewFrontierItem {
    NewFrontierItem {
        url: url.to_string(),
        source_id,
        depth: 0,
        priority,
    }
}

fn setup() -> (TempDir, SqliteStorage, i64) {
    let dir = TempDir::new().unwrap();
    let mut storage = open(&dir);
    let source_id = storage
        .upsert_source(&source("site", SourceKind::Url, "https://site.test/", Some(2)))
        .unwrap();
    (dir, storage, source_id)
}

#[test]
fn test_dequeue_orders_by_priority_then_discovery() {
    let (_dir, mut storage, sid) = setup();

    // B is discovered first but has the lowest priority
    storage.enqueue(&[item("https://site.test/b", sid, 5)]).unwrap();
    storage.enqueue(&[item("https://site.test/a", sid, 10)]).unwrap();
    storage.enqueue(&[item("https://site.test/c", sid, 10)]).unwrap();

    let batch = storage.dequeue_batch(10).unwrap();
    let urls: Vec<&str> = batch.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://site.test/a", "https://site.test/c", "https://site.test/b"]
    );

    // Dequeue does not claim items
    assert_eq!(storage.dequeue_batch(10).unwrap().len(), 3);
    assert_eq!(storage.dequeue_batch(2).unwrap().len(), 2);
}

#[test]
fn test_enqueue_is_idempotent_per_url() {
    let (_dir, mut storage, sid) = setup();

    let inserted = storage
        .enqueue(&[
            item("https://site.test/a", sid, 10),
            item("https://site.test/a", sid, 50),
            item("https://site.test/b", sid, 10),
        ])
        .unwrap();
    assert_eq!(inserted, 2);

    assert_eq!(
        storage.enqueue(&[item("https://site.test/a", sid, 99)]).unwrap(),
        0
    );

    let batch = storage.dequeue_batch(10).unwrap();
    assert_eq!(batch.len(), 2);
    let a = batch.iter().find(|i| i.url == "https://site.test/a").unwrap();
    assert_eq!(a.priority, 10);
}

#[test]
fn test_completed_items_are_never_requeued() {
    let (_dir, mut storage, sid) = setup();
    storage.enqueue(&[item("https://site.test/a", sid, 10)]).unwrap();
    let id = storage.dequeue_batch(1).unwrap()[0].id;

    storage.mark_done(id, QueueStatus::Completed, None).unwrap();
    assert!(storage.dequeue_batch(10).unwrap().is_empty());

    assert_eq!(
        storage.enqueue(&[item("https://site.test/a", sid, 10)]).unwrap(),
        0
    );
    assert!(storage.is_queued("https://site.test/a").unwrap());
}

#[test]
fn test_failed_items_reset_by_operator() {
    let (_dir, mut storage, sid) = setup();
    storage.enqueue(&[item("https://site.test/a", sid, 10)]).unwrap();
    let id = storage.dequeue_batch(1).unwrap()[0].id;

    storage
        .mark_done(id, QueueStatus::Failed, Some("navigation timeout"))
        .unwrap();
    let counts = storage.frontier_counts().unwrap();
    assert_eq!(counts.get(&QueueStatus::Failed), Some(&1));

    assert_eq!(storage.reset_failed_items().unwrap(), 1);
    let pending = storage.dequeue_batch(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, QueueStatus::Pending);
}

#[test]
fn test_mark_done_rejects_pending() {
    let (_dir, mut storage, sid) = setup();
    storage.enqueue(&[item("https://site.test/a", sid, 10)]).unwrap();
    let id = storage.dequeue_batch(1).unwrap()[0].id;

    assert!(storage.mark_done(id, QueueStatus::Pending, None).is_err());
}

#[test]
fn test_frontier_survives_reopen() {
    let (dir, mut storage, sid) = setup();
    storage
        .enqueue(&[item("https://site.test/a", sid, 10), item("https://site.test/b", sid, 20)])
        .unwrap();
    drop(storage);

    let reopened = open(&dir);
    let batch = reopened.dequeue_batch(10).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].url, "https://site.test/b");
}
