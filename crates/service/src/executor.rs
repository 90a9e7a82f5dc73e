//! Upload execution
//!
//! Streams the archive to the provider and tracks the wire protocol's
//! event stream: uploading, piece-added, piece-confirmed, then the
//! best-effort index-advertisement phase. The payload is durably stored
//! once piece-confirmed fires; public discoverability is a secondary
//! property, so exhausting advertisement retries degrades to a warning
//! instead of failing the upload.

use std::time::Duration;

use bytes::Bytes;

use common::linked_data::Cid;

use crate::error::{StageExt, UploadError};
use crate::market::{DatasetId, ProviderInfo, StorageContext, UploadEvent};
use crate::progress::{ProgressSink, ProgressStage, RateEstimator, ESTIMATE_CAP_PERCENT};

/// Bounded retry count for public index advertisement
pub const INDEX_ADVERT_MAX_RETRIES: u32 = 3;

/// Cadence of estimated progress updates during the raw transfer phase
const PROGRESS_TICK: Duration = Duration::from_millis(250);

/// What the provider accepted, before any CID privacy protection
#[derive(Debug, Clone)]
pub struct PieceReceipt {
    pub piece_cid: String,
    pub dataset_id: DatasetId,
    pub tx_hash: String,
    pub provider: ProviderInfo,
    pub index_advertised: bool,
}

/// Execute the upload against a bound storage context.
///
/// Any error here is fatal to the call; the caller owns whole-pipeline
/// retries.
pub async fn execute(
    context: &dyn StorageContext,
    archive: Bytes,
    root_cid: &Cid,
    progress: &ProgressSink,
) -> Result<PieceReceipt, UploadError> {
    let total_bytes = archive.len() as u64;
    let receiver = context
        .upload(archive, root_cid)
        .await
        .stage("upload transfer")?;

    let estimator = RateEstimator::start(total_bytes);
    let mut ticker = tokio::time::interval(PROGRESS_TICK);
    let mut piece_cid: Option<String> = None;

    let tx_hash = loop {
        tokio::select! {
            event = receiver.recv_async() => match event {
                Ok(UploadEvent::Uploading) => {
                    progress.estimated(
                        ProgressStage::Uploading,
                        estimator.percent(),
                        "transferring archive",
                        estimator.bytes_estimate(),
                        total_bytes,
                    );
                }
                Ok(UploadEvent::PieceAdded { piece_cid: cid }) => {
                    tracing::debug!(piece_cid = %cid, "piece added");
                    piece_cid = Some(cid);
                    progress.confirmed(
                        ProgressStage::Uploading,
                        ESTIMATE_CAP_PERCENT,
                        "piece added, awaiting on-chain confirmation",
                    );
                }
                Ok(UploadEvent::PieceConfirmed { tx_hash }) => {
                    progress.confirmed(ProgressStage::Uploading, 100, "piece confirmed on chain");
                    break tx_hash;
                }
                // Some providers push index events on the same stream; the
                // dedicated advertisement phase below is authoritative.
                Ok(UploadEvent::IndexAdvertising { .. })
                | Ok(UploadEvent::IndexConfirmed)
                | Ok(UploadEvent::IndexPending { .. }) => {}
                Ok(UploadEvent::Unknown) => {
                    tracing::debug!("ignoring unrecognized upload event");
                }
                Err(_) => {
                    return Err(UploadError::UploadExecution(
                        "upload event stream ended before piece confirmation".to_string(),
                    ));
                }
            },
            _ = ticker.tick() => {
                if piece_cid.is_none() {
                    progress.estimated(
                        ProgressStage::Uploading,
                        estimator.percent(),
                        "transferring archive",
                        estimator.bytes_estimate(),
                        total_bytes,
                    );
                }
            }
        }
    };

    let piece_cid = piece_cid.ok_or_else(|| {
        UploadError::UploadExecution("piece confirmed without a piece identifier".to_string())
    })?;

    let index_advertised = advertise_with_retries(context, &piece_cid, progress).await;

    Ok(PieceReceipt {
        piece_cid,
        dataset_id: context.dataset_id(),
        tx_hash,
        provider: context.provider_info(),
        index_advertised,
    })
}

async fn advertise_with_retries(
    context: &dyn StorageContext,
    piece_cid: &str,
    progress: &ProgressSink,
) -> bool {
    for retry_count in 1..=INDEX_ADVERT_MAX_RETRIES {
        progress.confirmed(
            ProgressStage::Advertising,
            0,
            format!(
                "advertising to public index (attempt {}/{})",
                retry_count, INDEX_ADVERT_MAX_RETRIES
            ),
        );
        match context.advertise_index(piece_cid).await {
            Ok(()) => {
                progress.confirmed(
                    ProgressStage::Advertising,
                    100,
                    "public index advertisement confirmed",
                );
                return true;
            }
            Err(e) => {
                tracing::warn!(retry_count, "index advertisement attempt failed: {}", e);
            }
        }
    }
    tracing::warn!(
        retry_count = INDEX_ADVERT_MAX_RETRIES,
        piece_cid,
        "public index advertisement still pending; payload is durably stored"
    );
    false
}
