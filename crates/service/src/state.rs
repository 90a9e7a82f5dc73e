use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::UploadError;
use crate::market::{HttpStorageMarket, StorageMarket};
use crate::persist::MetadataStore;
use crate::threshold::{CryptoService, HttpThresholdNetwork, ThresholdHandle, ThresholdNetwork};

use common::crypto::SecretKey;

/// Main service state - owns the shared collaborator handles
///
/// The threshold-network handle is the only cross-invocation shared
/// resource: created lazily on first use, reused by every pipeline
/// invocation, and torn down once by [`State::shutdown`] at process exit.
/// Collaborators are injected so tests can substitute fakes.
#[derive(Clone)]
pub struct State {
    config: ServiceConfig,
    threshold: ThresholdHandle,
    market: Arc<dyn StorageMarket>,
    metadata_store: Arc<dyn MetadataStore>,
}

impl State {
    /// Wire up the production collaborators from configuration.
    pub fn from_config(
        config: ServiceConfig,
        identity_key: &SecretKey,
        metadata_store: Arc<dyn MetadataStore>,
    ) -> Result<Self, UploadError> {
        // 1. Threshold network client (connects lazily on first use)
        let threshold = ThresholdHandle::new(Arc::new(HttpThresholdNetwork::new(
            config.threshold_endpoint.clone(),
        )));

        // 2. Storage market client for the paying account
        let market: Arc<dyn StorageMarket> = Arc::new(HttpStorageMarket::new(
            config.network_endpoint.clone(),
            identity_key.public().to_hex(),
        ));

        Ok(Self {
            config,
            threshold,
            market,
            metadata_store,
        })
    }

    /// Wire up with injected collaborators (tests, alternative transports).
    pub fn with_collaborators(
        config: ServiceConfig,
        threshold: Arc<dyn ThresholdNetwork>,
        market: Arc<dyn StorageMarket>,
        metadata_store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config,
            threshold: ThresholdHandle::new(threshold),
            market,
            metadata_store,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn crypto(&self) -> CryptoService {
        CryptoService::new(self.threshold.clone(), self.config.chain_id)
    }

    pub fn market(&self) -> &dyn StorageMarket {
        self.market.as_ref()
    }

    pub fn metadata_store(&self) -> &dyn MetadataStore {
        self.metadata_store.as_ref()
    }

    /// Tear down process-wide resources. Call once at shutdown.
    pub async fn shutdown(&self) {
        self.threshold.shutdown().await;
    }
}
