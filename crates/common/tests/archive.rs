//! Integration tests for archive construction and cleanup interplay

use std::str::FromStr;

use common::archive::{self, ArchiveSource, CHUNK_SIZE};
use common::cleanup::CleanupGuard;
use common::linked_data::Cid;

#[tokio::test]
async fn test_archive_from_file_is_deterministic() {
    let dir = tempfile::TempDir::new().unwrap();
    let source_path = dir.path().join("capture.bin");
    let payload: Vec<u8> = (0..(2 * CHUNK_SIZE + 99)).map(|i| (i % 101) as u8).collect();
    tokio::fs::write(&source_path, &payload).await.unwrap();

    let mut guard = CleanupGuard::new();
    let first = archive::build(ArchiveSource::Path(&source_path), dir.path(), &mut guard)
        .await
        .unwrap();
    let second = archive::build(ArchiveSource::Path(&source_path), dir.path(), &mut guard)
        .await
        .unwrap();

    assert_eq!(first.root_cid, second.root_cid);
    assert_eq!(first.archive_bytes, second.archive_bytes);
    assert_eq!(first.size_bytes, first.archive_bytes.len() as u64);

    guard.run_all().await;
}

#[tokio::test]
async fn test_root_cid_round_trips_as_string() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut guard = CleanupGuard::new();
    let result = archive::build(ArchiveSource::Bytes(b"round trip"), dir.path(), &mut guard)
        .await
        .unwrap();

    let parsed = Cid::from_str(&result.root_cid.to_string()).unwrap();
    assert_eq!(parsed, result.root_cid);

    guard.run_all().await;
}

#[tokio::test]
async fn test_explicit_archive_cleanup() {
    let dir = tempfile::TempDir::new().unwrap();
    // A guard that is never drained, to exercise the standalone cleanup path
    let mut guard = CleanupGuard::new();
    let result = archive::build(ArchiveSource::Bytes(b"payload"), dir.path(), &mut guard)
        .await
        .unwrap();

    assert!(result.archive_path.exists());
    archive::cleanup(&result.archive_path).await.unwrap();
    assert!(!result.archive_path.exists());

    // Removing an already-removed archive is not an error.
    archive::cleanup(&result.archive_path).await.unwrap();
    guard.run_all().await;
}

#[tokio::test]
async fn test_guard_drains_across_multiple_builds() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut guard = CleanupGuard::new();

    for payload in [b"first".as_slice(), b"second".as_slice()] {
        archive::build(ArchiveSource::Bytes(payload), dir.path(), &mut guard)
            .await
            .unwrap();
    }
    assert_eq!(guard.pending(), 4);

    guard.run_all().await;
    assert_eq!(guard.pending(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
