//! The encrypted content-addressed upload pipeline
//!
//! One invocation runs a strict sequence: optional encryption, archive
//! construction, payment readiness validation, storage context creation,
//! upload execution, and (for encrypted payloads) CID privacy protection.
//! The whole body runs inside a cleanup guard; every temporary resource is
//! released at teardown whether the pipeline succeeded or threw.
//!
//! Invocations are independent of each other. The only shared resource is
//! the threshold-network handle owned by [`State`], which is safe for
//! concurrent use.

use std::path::PathBuf;

use serde::Serialize;

use common::access::EncryptionMetadata;
use common::archive::{self, ArchiveResult, ArchiveSource};
use common::cleanup::CleanupGuard;
use common::crypto::SecretKey;
use common::linked_data::Cid;

use crate::config::UploadConfig;
use crate::context;
use crate::error::{StageExt, UploadError};
use crate::executor;
use crate::guard::protect_cid;
use crate::market::{DatasetId, ProviderInfo};
use crate::payment::{self, ReadinessStatus};
use crate::persist::UploadRecord;
use crate::progress::{ProgressSink, ProgressStage};
use crate::state::State;

/// Where the media payload comes from
#[derive(Debug, Clone)]
pub enum UploadSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: UploadSource,
    /// Original on-disk location of the recording, recorded in metadata
    pub original_path: Option<PathBuf>,
    pub config: UploadConfig,
}

/// Result of one successful pipeline invocation
///
/// `encrypted_root_cid` and `cid_encryption_metadata` are present if and
/// only if `is_encrypted` is true.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub root_cid: Cid,
    pub piece_cid: String,
    pub dataset_id: DatasetId,
    pub tx_hash: String,
    pub provider: ProviderInfo,
    pub is_encrypted: bool,
    pub encryption_metadata: Option<EncryptionMetadata>,
    pub encrypted_root_cid: Option<String>,
    pub cid_encryption_metadata: Option<EncryptionMetadata>,
}

/// Upload a recording to the storage market.
///
/// The cleanup guard drains unconditionally after the run: local temp
/// files first, then remote session teardown, in reverse-registration
/// order within each pass.
pub async fn upload_video(
    state: &State,
    request: UploadRequest,
    progress: &ProgressSink,
) -> Result<UploadOutcome, UploadError> {
    let mut guard = CleanupGuard::new();
    let result = run_upload(state, request, &mut guard, progress).await;
    guard.run_all().await;
    if progress.is_aborted() {
        tracing::debug!("pipeline invocation was aborted by the caller; result discarded");
    }
    result
}

async fn run_upload(
    state: &State,
    request: UploadRequest,
    guard: &mut CleanupGuard,
    progress: &ProgressSink,
) -> Result<UploadOutcome, UploadError> {
    let config = request.config.clone();
    let identity_key = &config.identity_key;
    let scratch_dir = std::env::temp_dir();

    // Encryption strictly precedes archive construction.
    let (archive, encryption_metadata) =
        build_payload_archive(state, &request, guard, progress, &scratch_dir).await?;
    tracing::info!(
        root_cid = %archive.root_cid,
        size = archive.size_bytes,
        encrypted = encryption_metadata.is_some(),
        "archive built"
    );

    // Readiness strictly precedes storage-context creation. A blocked
    // verdict is terminal: it needs user action, not a retry.
    let readiness = payment::check_readiness(
        state.market(),
        archive.size_bytes,
        config.auto_configure_allowances,
        progress,
    )
    .await?;
    if readiness.status == ReadinessStatus::Blocked {
        let message = readiness
            .validation
            .error_message
            .unwrap_or_else(|| "payment validation failed".to_string());
        return Err(UploadError::PaymentBlocked {
            message,
            suggestions: readiness.suggestions,
        });
    }

    let bound = context::create_context(state.market(), config.existing_dataset_id, progress).await?;
    {
        let context = bound.context.clone();
        guard.register_remote("storage provider session", move || async move {
            context.close().await.map_err(anyhow::Error::new)
        });
    }

    let receipt = executor::execute(
        bound.context.as_ref(),
        archive.archive_bytes.clone(),
        &archive.root_cid,
        progress,
    )
    .await?;

    // CID protection strictly follows successful upload confirmation.
    let (encrypted_root_cid, cid_encryption_metadata) = match encryption_metadata {
        Some(_) => {
            progress.confirmed(ProgressStage::ProtectingCid, 0, "protecting content identifier");
            let protected = protect_cid(&state.crypto(), &archive.root_cid, identity_key).await?;
            progress.confirmed(ProgressStage::ProtectingCid, 100, "content identifier protected");
            (Some(protected.encrypted_root_cid), Some(protected.metadata))
        }
        None => (None, None),
    };

    let outcome = UploadOutcome {
        root_cid: archive.root_cid,
        piece_cid: receipt.piece_cid,
        dataset_id: receipt.dataset_id,
        tx_hash: receipt.tx_hash,
        provider: receipt.provider,
        is_encrypted: encryption_metadata.is_some(),
        encryption_metadata,
        encrypted_root_cid,
        cid_encryption_metadata,
    };

    persist_outcome(state, &request, &outcome, progress).await;

    progress.confirmed(ProgressStage::Complete, 100, "upload complete");
    Ok(outcome)
}

async fn build_payload_archive(
    state: &State,
    request: &UploadRequest,
    guard: &mut CleanupGuard,
    progress: &ProgressSink,
    scratch_dir: &std::path::Path,
) -> Result<(ArchiveResult, Option<EncryptionMetadata>), UploadError> {
    if request.config.encryption_enabled {
        progress.confirmed(ProgressStage::Encrypting, 0, "encrypting recording");
        let plaintext = match &request.source {
            UploadSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| UploadError::Other(e.into()))
                .stage("source read")?,
            UploadSource::Bytes(bytes) => bytes.clone(),
        };
        let (ciphertext, metadata) = state
            .crypto()
            .encrypt(&plaintext, &request.config.identity_key)
            .await
            .stage("encryption")?;
        progress.confirmed(ProgressStage::Encrypting, 100, "recording encrypted");

        progress.confirmed(ProgressStage::Packaging, 0, "packaging archive");
        let archive = archive::build(ArchiveSource::Bytes(&ciphertext), scratch_dir, guard)
            .await
            .stage("archive construction")?;
        progress.confirmed(ProgressStage::Packaging, 100, "archive ready");
        Ok((archive, Some(metadata)))
    } else {
        progress.confirmed(ProgressStage::Packaging, 0, "packaging archive");
        let source = match &request.source {
            UploadSource::Path(path) => ArchiveSource::Path(path.as_path()),
            UploadSource::Bytes(bytes) => ArchiveSource::Bytes(bytes.as_slice()),
        };
        let archive = archive::build(source, scratch_dir, guard)
            .await
            .stage("archive construction")?;
        progress.confirmed(ProgressStage::Packaging, 100, "archive ready");
        Ok((archive, None))
    }
}

/// Persistence failure is logged and does not roll back the upload.
async fn persist_outcome(
    state: &State,
    request: &UploadRequest,
    outcome: &UploadOutcome,
    progress: &ProgressSink,
) {
    progress.confirmed(ProgressStage::Persisting, 0, "saving upload record");
    let record = UploadRecord {
        video_path: request.original_path.clone(),
        mime_type: request
            .original_path
            .as_ref()
            .and_then(|p| mime_guess::from_path(p).first())
            .map(|m| m.essence_str().to_string()),
        root_cid: outcome.root_cid.to_string(),
        piece_cid: outcome.piece_cid.clone(),
        dataset_id: outcome.dataset_id,
        tx_hash: outcome.tx_hash.clone(),
        is_encrypted: outcome.is_encrypted,
        encryption_metadata: outcome.encryption_metadata.clone(),
        encrypted_root_cid: outcome.encrypted_root_cid.clone(),
        cid_encryption_metadata: outcome.cid_encryption_metadata.clone(),
    };
    if let Err(e) = state.metadata_store().save_upload(&record).await {
        tracing::warn!("upload record persistence failed: {}", e);
    }
}

/// Decrypt a previously uploaded recording for playback.
///
/// The symmetric, shorter pipeline: session authorization then decryption,
/// with progress. No payment or archive stages are involved.
pub async fn decrypt_video(
    state: &State,
    encrypted_bytes: &[u8],
    metadata: &EncryptionMetadata,
    identity_key: &SecretKey,
    progress: &ProgressSink,
) -> Result<Vec<u8>, UploadError> {
    progress.confirmed(ProgressStage::Authorizing, 0, "requesting decryption session");
    let plaintext = state
        .crypto()
        .decrypt(encrypted_bytes, metadata, identity_key)
        .await
        .stage("decryption")?;
    progress.confirmed(ProgressStage::Decrypting, 100, "recording decrypted");
    Ok(plaintext)
}
