use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::{
    Challenge, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, SessionCredentials,
    SessionRequest, ThresholdError, ThresholdNetwork,
};

/// JSON-over-HTTP client for the threshold network
///
/// One pinned interface version; request/response contracts are given, the
/// protocol itself is not reimplemented here.
pub struct HttpThresholdNetwork {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpThresholdNetwork {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    fn url(&self, path: &str) -> Result<Url, ThresholdError> {
        self.endpoint
            .join(path)
            .map_err(|e| anyhow::anyhow!("invalid endpoint path {}: {}", path, e).into())
    }

    async fn post<B: serde::Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ThresholdError> {
        let response = self.client.post(self.url(path)?).json(body).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let detail = response.text().await.unwrap_or_default();
            return Err(ThresholdError::Session(detail));
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl ThresholdNetwork for HttpThresholdNetwork {
    async fn connect(&self) -> Result<(), ThresholdError> {
        self.client
            .get(self.url("v1/health")?)
            .send()
            .await?
            .error_for_status()?;
        tracing::debug!(endpoint = %self.endpoint, "threshold network reachable");
        Ok(())
    }

    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, ThresholdError> {
        self.post("v1/encrypt", &request).await
    }

    async fn challenge(&self) -> Result<Challenge, ThresholdError> {
        self.post("v1/session/challenge", &serde_json::json!({})).await
    }

    async fn authorize(
        &self,
        request: SessionRequest,
    ) -> Result<SessionCredentials, ThresholdError> {
        self.post("v1/session", &request).await
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, ThresholdError> {
        self.post("v1/decrypt", &request).await
    }

    async fn disconnect(&self) -> Result<(), ThresholdError> {
        // Connections are pooled by the client; nothing to tear down remotely.
        Ok(())
    }
}
