//! Payment readiness checks against scripted market states

mod common;

use service::payment::{check_readiness, ReadinessStatus};
use service::testkit::FakeStorageMarket;
use service::{upload_video, ProgressSink, UploadError};

#[tokio::test]
async fn test_ready_market_passes_all_checks() {
    let market = FakeStorageMarket::ready();

    let result = check_readiness(market.as_ref(), 1024, true, &ProgressSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.status, ReadinessStatus::Ready);
    assert!(result.suggestions.is_empty());
    assert_eq!(
        market.calls(),
        vec!["balance", "estimate_cost", "allowances", "max_upload_size"]
    );
}

#[tokio::test]
async fn test_allowances_are_auto_configured() {
    let market = FakeStorageMarket::without_allowances(true);

    let result = check_readiness(market.as_ref(), 1024, true, &ProgressSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.status, ReadinessStatus::Ready);
    assert!(market.calls().iter().any(|c| c == "approve_allowances"));
}

#[tokio::test]
async fn test_unconfigurable_allowances_block() {
    let market = FakeStorageMarket::without_allowances(false);

    let result = check_readiness(market.as_ref(), 1024, true, &ProgressSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.status, ReadinessStatus::Blocked);
    assert!(result
        .suggestions
        .iter()
        .any(|s| s.contains("approve storage allowances")));
}

#[tokio::test]
async fn test_auto_configure_disabled_blocks_without_approving() {
    let market = FakeStorageMarket::without_allowances(true);

    let result = check_readiness(market.as_ref(), 1024, false, &ProgressSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.status, ReadinessStatus::Blocked);
    assert!(!market.calls().iter().any(|c| c == "approve_allowances"));
}

#[tokio::test]
async fn test_oversized_file_blocks() {
    let market = FakeStorageMarket::with_max_upload_size(16);

    let result = check_readiness(market.as_ref(), 1024, true, &ProgressSink::disabled())
        .await
        .unwrap();

    assert_eq!(result.status, ReadinessStatus::Blocked);
    assert_eq!(result.validation.max_upload_size, Some(16));
}

#[tokio::test]
async fn test_blocked_readiness_surfaces_validation_details() {
    let env = common::setup_with_market(FakeStorageMarket::blocked_balance());

    let err = upload_video(
        &env.state,
        common::request(&env, common::sample_payload(), false),
        &ProgressSink::disabled(),
    )
    .await
    .unwrap_err();

    let rendered = err.to_string();
    assert!(rendered.contains("payment not ready"));
    assert!(matches!(err.root(), UploadError::PaymentBlocked { .. }));
    assert!(!err.is_retryable());
}
