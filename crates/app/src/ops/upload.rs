use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Args;

use service::market::DatasetId;
use service::{
    upload_video, ProgressSink, ServiceConfig, State, UploadConfig, UploadError, UploadRequest,
    UploadSource,
};

use crate::state::AppState;
use crate::store::FileMetadataStore;

#[derive(Args, Debug, Clone)]
pub struct Upload {
    /// Absolute path to the recording on the filesystem
    #[arg(long)]
    pub path: PathBuf,

    /// Encrypt the recording before upload (overrides the config default)
    #[arg(long)]
    pub encrypt: bool,

    /// Reuse an existing dataset instead of provisioning a new one
    #[arg(long)]
    pub dataset_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadOpError {
    #[error("state error: {0}")]
    State(#[from] crate::state::StateError),
    #[error("upload failed: {0}")]
    Pipeline(#[from] UploadError),
    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Upload {
    type Error = UploadOpError;
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

        let encrypt = self.encrypt || app_state.config.encryption_enabled;
        let mut config = UploadConfig::new(identity_key, encrypt);
        let dataset_arg = self
            .dataset_id
            .clone()
            .or_else(|| app_state.config.dataset_id.clone());
        if let Some(raw) = dataset_arg {
            let dataset_id = DatasetId::from_str(&raw)
                .map_err(|_| UploadOpError::InvalidDatasetId(raw.clone()))?;
            config = config.with_existing_dataset(dataset_id);
        }

        let progress = ProgressSink::new(Arc::new(|update| {
            eprintln!("[{:>3}%] {}", update.percent, update.message);
        }));

        let request = UploadRequest {
            source: UploadSource::Path(self.path.clone()),
            original_path: Some(self.path.clone()),
            config,
        };
        let result = upload_video(&state, request, &progress).await;
        state.shutdown().await;
        let outcome = result?;

        let mut output = format!(
            "Upload complete\n\
             - Root CID: {}\n\
             - Piece: {}\n\
             - Dataset: {}\n\
             - Transaction: {}\n\
             - Provider: {}",
            outcome.root_cid,
            outcome.piece_cid,
            outcome.dataset_id,
            outcome.tx_hash,
            outcome.provider.name,
        );
        if let Some(ref encrypted_cid) = outcome.encrypted_root_cid {
            output.push_str(&format!("\n- Encrypted root CID: {}", encrypted_cid));
        }
        Ok(output)
    }
}
