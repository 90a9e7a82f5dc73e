//! Error taxonomy for the upload pipeline
//!
//! Retryability is encoded per variant: network and timeout failures are
//! transient (safe to retry the whole pipeline), payment blocks require
//! user action, metadata corruption and configuration problems require
//! corrected input. Cleanup failures never surface here at all; the
//! cleanup guard downgrades them to warnings.

use std::time::Duration;

use common::access::MetadataError;
use common::archive::ArchiveError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Bad or missing key, bad URL. Not retryable without user correction.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Corrupted stored encryption metadata. Not retryable.
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
    /// Session or signature mismatch. Retryable after the user re-verifies
    /// their identity key.
    #[error("authentication failed: {0}; confirm the identity key matches the one used for encryption")]
    Authentication(String),
    /// Insufficient funds or allowance. Not retryable until funded.
    #[error("payment not ready: {message}")]
    PaymentBlocked {
        message: String,
        suggestions: Vec<String>,
    },
    /// Transient network failure. Safe to retry the whole pipeline.
    #[error("network error: {0}")]
    Network(String),
    /// A bounded wait elapsed. Safe to retry the whole pipeline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Fatal per-call upload failure.
    #[error("upload execution failed: {0}")]
    UploadExecution(String),
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    /// Stage-qualified wrapper so the caller can present a single
    /// human-readable string while logs retain the full cause chain.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<UploadError>,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UploadError {
    /// Wrap this error with a stage qualifier.
    pub fn stage(self, stage: &'static str) -> Self {
        UploadError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Peel stage wrappers down to the underlying error.
    pub fn root(&self) -> &UploadError {
        match self {
            UploadError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether retrying the whole pipeline could plausibly succeed without
    /// user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            UploadError::Network(_) | UploadError::Timeout(_)
        )
    }
}

/// Stage-qualify errors on a result chain.
pub trait StageExt<T> {
    fn stage(self, stage: &'static str) -> Result<T, UploadError>;
}

impl<T, E: Into<UploadError>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: &'static str) -> Result<T, UploadError> {
        self.map_err(|e| e.into().stage(stage))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stage_wrapping_preserves_root() {
        let err = UploadError::Network("connection reset".to_string()).stage("piece upload");
        assert!(matches!(err.root(), UploadError::Network(_)));
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("piece upload failed:"));
    }

    #[test]
    fn test_payment_blocked_is_not_retryable() {
        let err = UploadError::PaymentBlocked {
            message: "insufficient balance".to_string(),
            suggestions: vec!["top up balance".to_string()],
        };
        assert!(!err.is_retryable());
    }
}
