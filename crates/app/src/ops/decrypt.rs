use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use common::access::EncryptionMetadata;
use service::{decrypt_video, ProgressSink, ServiceConfig, State, UploadError};

use crate::state::AppState;
use crate::store::FileMetadataStore;

#[derive(Args, Debug, Clone)]
pub struct Decrypt {
    /// Path to the encrypted payload on the filesystem
    #[arg(long)]
    pub path: PathBuf,

    /// Path to the stored encryption metadata (JSON)
    #[arg(long)]
    pub metadata: PathBuf,

    /// Where to write the decrypted recording
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum DecryptOpError {
    #[error("state error: {0}")]
    State(#[from] crate::state::StateError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata parse error: {0}")]
    MetadataParse(#[from] serde_json::Error),
    #[error("decryption failed: {0}")]
    Pipeline(#[from] UploadError),
}

#[async_trait::async_trait]
impl crate::op::Op for Decrypt {
    type Error = DecryptOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let app_state = AppState::load(ctx.config_path.clone())?;
        let identity_key = app_state.identity_key()?;

        let service_config = ServiceConfig::new(
            &app_state.config.network_endpoint,
            &app_state.config.threshold_endpoint,
        )?;
        let store = Arc::new(FileMetadataStore::new(app_state.uploads_path.clone()));
        let state = State::from_config(service_config, &identity_key, store)?;

        let encrypted = tokio::fs::read(&self.path).await?;
        let metadata_json: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&self.metadata).await?)?;
        let metadata = EncryptionMetadata::from_storage_json(&metadata_json)
            .map_err(UploadError::Metadata)?;

        let progress = ProgressSink::new(Arc::new(|update| {
            eprintln!("[{:>3}%] {}", update.percent, update.message);
        }));

        let result = decrypt_video(&state, &encrypted, &metadata, &identity_key, &progress).await;
        state.shutdown().await;
        let plaintext = result?;

        tokio::fs::write(&self.output, &plaintext).await?;
        Ok(format!(
            "Decrypted {} bytes to {}",
            plaintext.len(),
            self.output.display()
        ))
    }
}
