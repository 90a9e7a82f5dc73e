//! End-to-end pipeline tests against the in-memory fakes

mod common;

use uuid::Uuid;

use ::common::access::EncryptionMetadata;
use ::common::archive::{self, ArchiveSource};
use ::common::cleanup::CleanupGuard;

use service::market::DatasetId;
use service::testkit::FakeStorageMarket;
use service::{upload_video, ProgressSink, ProgressStage, UploadError};

#[tokio::test]
async fn test_unencrypted_upload() {
    let env = common::setup();
    let payload = common::sample_payload();

    // The expected root CID is whatever a bare archive build of the same
    // bytes produces; content addressing makes this deterministic.
    let scratch = tempfile::tempdir().unwrap();
    let mut guard = CleanupGuard::new();
    let expected = archive::build(ArchiveSource::Bytes(&payload), scratch.path(), &mut guard)
        .await
        .unwrap();
    guard.run_all().await;

    let outcome = upload_video(
        &env.state,
        common::request(&env, payload, false),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();

    assert!(!outcome.is_encrypted);
    assert!(outcome.encryption_metadata.is_none());
    assert!(outcome.encrypted_root_cid.is_none());
    assert!(outcome.cid_encryption_metadata.is_none());
    assert_eq!(outcome.root_cid, expected.root_cid);
    assert_eq!(outcome.piece_cid, format!("piece-{}", expected.root_cid));
    assert!(!outcome.tx_hash.is_empty());
}

#[tokio::test]
async fn test_upload_is_deterministic_across_invocations() {
    let env = common::setup();
    let payload = common::sample_payload();

    let first = upload_video(
        &env.state,
        common::request(&env, payload.clone(), false),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();
    let second = upload_video(
        &env.state,
        common::request(&env, payload, false),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();

    assert_eq!(first.root_cid, second.root_cid);
}

#[tokio::test]
async fn test_encrypted_upload() {
    let env = common::setup();

    let outcome = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), true),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();

    assert!(outcome.is_encrypted);
    let metadata = outcome.encryption_metadata.as_ref().unwrap();
    assert!(!metadata.content_hash.is_empty());
    assert_eq!(metadata.access_control_conditions.len(), 1);
    assert_eq!(
        metadata.access_control_conditions[0].value,
        env.key.public().to_hex()
    );
    assert!(outcome.encrypted_root_cid.is_some());
    assert!(outcome.cid_encryption_metadata.is_some());

    // The stored form must never carry ciphertext.
    let stored = metadata.to_storage_json().unwrap();
    assert!(stored.get("ciphertext").is_none());
    assert!(EncryptionMetadata::from_storage_json(&stored).is_ok());
}

#[tokio::test]
async fn test_encrypted_root_cid_differs_from_plaintext_cid() {
    let env = common::setup();

    let outcome = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), true),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();

    let encrypted_cid = outcome.encrypted_root_cid.unwrap();
    assert_ne!(encrypted_cid, outcome.root_cid.to_string());
}

#[tokio::test]
async fn test_blocked_payment_short_circuits() {
    let env = common::setup_with_market(FakeStorageMarket::blocked_balance());

    let err = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), false),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap_err();

    match err.root() {
        UploadError::PaymentBlocked {
            message,
            suggestions,
        } => {
            assert!(message.contains("insufficient balance"));
            assert_eq!(suggestions, &vec!["top up balance".to_string()]);
        }
        other => panic!("expected PaymentBlocked, got {:?}", other),
    }

    // No storage context was created and nothing was persisted.
    assert!(!env.market.context_created());
    assert!(env.store.records().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_does_not_roll_back_upload() {
    let env = common::setup();
    env.store.set_fail(true);

    let outcome = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), false),
        &ProgressSink::disabled(),
    )
    .await;

    assert!(outcome.is_ok());
    assert!(env.store.records().is_empty());
}

#[tokio::test]
async fn test_upload_record_is_persisted() {
    let env = common::setup();

    let outcome = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), true),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();

    let records = env.store.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.root_cid, outcome.root_cid.to_string());
    assert_eq!(record.piece_cid, outcome.piece_cid);
    assert!(record.is_encrypted);
    assert_eq!(record.mime_type.as_deref(), Some("video/mp4"));
    assert_eq!(
        record.video_path.as_deref(),
        Some(std::path::Path::new("/captures/stream.mp4"))
    );
}

#[tokio::test]
async fn test_existing_dataset_is_reused() {
    let env = common::setup();
    let dataset_id = DatasetId(Uuid::new_v4());

    let mut req = common::request(&env, common::sample_payload(), false);
    req.config = req.config.with_existing_dataset(dataset_id);

    let outcome = upload_video(&env.state, req, &ProgressSink::disabled())
        .await
        .unwrap();
    assert_eq!(outcome.dataset_id, dataset_id);
}

#[tokio::test]
async fn test_stage_ordering_in_progress_stream() {
    let env = common::setup();
    let (sink, updates) = common::recording_sink();

    upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), true),
        &sink,
    )
    .await
    .unwrap();

    let updates = updates.lock();
    let encrypting = common::stage_index(&updates, ProgressStage::Encrypting);
    let packaging = common::stage_index(&updates, ProgressStage::Packaging);
    let validating = common::stage_index(&updates, ProgressStage::ValidatingPayment);
    let creating = common::stage_index(&updates, ProgressStage::CreatingContext);
    let uploading = common::stage_index(&updates, ProgressStage::Uploading);
    let protecting = common::stage_index(&updates, ProgressStage::ProtectingCid);
    let complete = common::stage_index(&updates, ProgressStage::Complete);

    assert!(encrypting < packaging);
    assert!(packaging < validating);
    assert!(validating < creating);
    assert!(creating < uploading);
    assert!(uploading < protecting);
    assert!(protecting < complete);
}

#[tokio::test]
async fn test_failed_upload_still_releases_provider_session() {
    let env = common::setup();
    env.market.set_fail_upload_stream(true);

    let err = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), false),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err.root(), UploadError::UploadExecution(_)));

    // The remote cleanup pass closed the provider session despite the failure.
    assert!(env.market.calls().iter().any(|c| c == "close"));
}

#[tokio::test]
async fn test_aborted_invocation_suppresses_progress() {
    let env = common::setup();
    let (sink, updates) = common::recording_sink();
    sink.abort_flag()
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let result = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), false),
        &sink,
    )
    .await;

    // The pipeline completes naturally; its progress is simply suppressed.
    assert!(result.is_ok());
    assert!(updates.lock().is_empty());
}
