use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use url::Url;

use common::linked_data::Cid;

use super::{
    AllowanceStatus, Balance, DatasetId, MarketError, ProviderInfo, StorageContext, StorageMarket,
    UploadEvent,
};

/// Interval between event-stream polls
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct CostResponse {
    cost: u128,
}

#[derive(Debug, Deserialize)]
struct LimitsResponse {
    max_upload_size: u64,
}

#[derive(Debug, Deserialize)]
struct ContextResponse {
    dataset_id: DatasetId,
    provider: ProviderInfo,
}

#[derive(Debug, Deserialize)]
struct UploadCreated {
    upload_id: String,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<UploadEvent>,
    next_cursor: u64,
    done: bool,
}

/// JSON-over-HTTP client for the storage market's documented contracts
pub struct HttpStorageMarket {
    client: reqwest::Client,
    endpoint: Url,
    /// Hex identity of the paying account
    identity: String,
}

impl HttpStorageMarket {
    pub fn new(endpoint: Url, identity: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            identity,
        }
    }

    fn url(&self, path: &str) -> Result<Url, MarketError> {
        self.endpoint
            .join(path)
            .map_err(|e| anyhow::anyhow!("invalid endpoint path {}: {}", path, e).into())
    }
}

#[async_trait]
impl StorageMarket for HttpStorageMarket {
    async fn balance(&self) -> Result<Balance, MarketError> {
        let url = self.url(&format!("v1/accounts/{}/balance", self.identity))?;
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn estimate_cost(&self, size_bytes: u64) -> Result<u128, MarketError> {
        let url = self.url(&format!("v1/pricing?size={}", size_bytes))?;
        let response: CostResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.cost)
    }

    async fn allowances(&self, required: u128) -> Result<AllowanceStatus, MarketError> {
        let url = self.url(&format!(
            "v1/accounts/{}/allowances?required={}",
            self.identity, required
        ))?;
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn approve_allowances(&self, required: u128) -> Result<(), MarketError> {
        let url = self.url(&format!("v1/accounts/{}/allowances", self.identity))?;
        self.client
            .post(url)
            .json(&serde_json::json!({ "required": required.to_string() }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn max_upload_size(&self) -> Result<u64, MarketError> {
        let url = self.url("v1/limits")?;
        let response: LimitsResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.max_upload_size)
    }

    async fn create_context(
        &self,
        existing: Option<DatasetId>,
    ) -> Result<Arc<dyn StorageContext>, MarketError> {
        let url = self.url("v1/datasets")?;
        let body = match existing {
            Some(id) => serde_json::json!({ "account": self.identity, "dataset_id": id }),
            None => serde_json::json!({ "account": self.identity }),
        };
        let response: ContextResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(
            dataset_id = %response.dataset_id,
            provider = %response.provider.name,
            "storage context created"
        );
        Ok(Arc::new(HttpStorageContext {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            dataset_id: response.dataset_id,
            provider: response.provider,
        }))
    }
}

struct HttpStorageContext {
    client: reqwest::Client,
    endpoint: Url,
    dataset_id: DatasetId,
    provider: ProviderInfo,
}

impl HttpStorageContext {
    fn url(&self, path: &str) -> Result<Url, MarketError> {
        self.endpoint
            .join(path)
            .map_err(|e| anyhow::anyhow!("invalid endpoint path {}: {}", path, e).into())
    }
}

#[async_trait]
impl StorageContext for HttpStorageContext {
    fn provider_info(&self) -> ProviderInfo {
        self.provider.clone()
    }

    fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    async fn upload(
        &self,
        archive: Bytes,
        root_cid: &Cid,
    ) -> Result<flume::Receiver<UploadEvent>, MarketError> {
        let url = self.url(&format!(
            "v1/datasets/{}/uploads?root={}",
            self.dataset_id, root_cid
        ))?;
        let created: UploadCreated = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(archive)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (sender, receiver) = flume::unbounded();
        let client = self.client.clone();
        let events_url = self.url(&format!("v1/uploads/{}/events", created.upload_id))?;
        tokio::spawn(async move {
            let mut cursor: u64 = 0;
            loop {
                let mut url = events_url.clone();
                url.set_query(Some(&format!("cursor={}", cursor)));
                let response = match client.get(url).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("upload event poll failed: {}", e);
                        break;
                    }
                };
                let page: EventsResponse = match response.json().await {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("upload event decode failed: {}", e);
                        break;
                    }
                };
                cursor = page.next_cursor;
                for event in page.events {
                    if sender.send(event).is_err() {
                        return;
                    }
                }
                if page.done {
                    break;
                }
                tokio::time::sleep(EVENT_POLL_INTERVAL).await;
            }
        });

        Ok(receiver)
    }

    async fn advertise_index(&self, piece_cid: &str) -> Result<(), MarketError> {
        let url = self.url("v1/index/advertise")?;
        self.client
            .post(url)
            .json(&serde_json::json!({ "piece_cid": piece_cid }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn close(&self) -> Result<(), MarketError> {
        let url = self.url(&format!("v1/datasets/{}/session", self.dataset_id))?;
        self.client.delete(url).send().await?.error_for_status()?;
        Ok(())
    }
}
