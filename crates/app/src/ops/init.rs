use clap::Args;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// RPC endpoint of the storage market
    #[arg(long)]
    pub network_endpoint: Option<String>,

    /// Endpoint of the threshold-cryptography network
    #[arg(long)]
    pub threshold_endpoint: Option<String>,

    /// Encrypt recordings before upload by default
    #[arg(long)]
    pub encrypt: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(ref endpoint) = self.network_endpoint {
            config.network_endpoint = endpoint.clone();
        }
        if let Some(ref endpoint) = self.threshold_endpoint {
            config.threshold_endpoint = endpoint.clone();
        }
        config.encryption_enabled = self.encrypt;

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized streamvault directory at: {}\n\
             - Identity key: {}\n\
             - Upload records: {}\n\
             - Config: {}\n\
             - Network endpoint: {}\n\
             - Threshold endpoint: {}\n\
             - Encryption enabled: {}",
            state.app_dir.display(),
            state.key_path.display(),
            state.uploads_path.display(),
            state.config_path.display(),
            state.config.network_endpoint,
            state.config.threshold_endpoint,
            state.config.encryption_enabled,
        );

        Ok(output)
    }
}
