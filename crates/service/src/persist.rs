//! Metadata persistence collaborator
//!
//! The backend metadata store is external; the pipeline invokes it through
//! this narrow interface after a successful upload. A persistence failure
//! is logged and does not roll back the otherwise-successful upload.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::access::EncryptionMetadata;

use crate::market::DatasetId;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("metadata persistence error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Persisted record of one completed upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub video_path: Option<PathBuf>,
    pub mime_type: Option<String>,
    pub root_cid: String,
    pub piece_cid: String,
    pub dataset_id: DatasetId,
    pub tx_hash: String,
    pub is_encrypted: bool,
    pub encryption_metadata: Option<EncryptionMetadata>,
    pub encrypted_root_cid: Option<String>,
    pub cid_encryption_metadata: Option<EncryptionMetadata>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_upload(&self, record: &UploadRecord) -> Result<(), PersistError>;
}
