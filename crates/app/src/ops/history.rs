use clap::Args;

use crate::state::AppState;
use crate::store::FileMetadataStore;

#[derive(Args, Debug, Clone)]
pub struct History {
    /// Only show encrypted uploads
    #[arg(long)]
    pub encrypted_only: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("state error: {0}")]
    State(#[from] crate::state::StateError),
    #[error("record store error: {0}")]
    Store(#[from] service::persist::PersistError),
}

#[async_trait::async_trait]
impl crate::op::Op for History {
    type Error = HistoryError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let app_state = AppState::load(ctx.config_path.clone())?;
        let store = FileMetadataStore::new(app_state.uploads_path.clone());

        let records = store.records().await?;
        let mut lines = Vec::new();
        for record in records {
            if self.encrypted_only && !record.is_encrypted {
                continue;
            }
            let path = record
                .video_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            lines.push(format!(
                "{}  {}  dataset={}  encrypted={}  {}",
                record.root_cid, record.piece_cid, record.dataset_id, record.is_encrypted, path
            ));
        }

        if lines.is_empty() {
            return Ok("no uploads recorded".to_string());
        }
        Ok(lines.join("\n"))
    }
}
