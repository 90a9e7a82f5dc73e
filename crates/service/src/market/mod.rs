//! Storage market client
//!
//! The decentralized storage market is an external collaborator: it
//! accepts payment for storing content-addressed data, confirms pieces
//! on-chain, and (best-effort) advertises them to a public index. This
//! module models its documented request/response contracts behind the
//! [`StorageMarket`] and [`StorageContext`] traits; the wire protocol
//! itself is not reimplemented.

mod http;

pub use http::HttpStorageMarket;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::linked_data::Cid;

use crate::error::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("storage market error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("storage market http error: {0}")]
    Http(String),
    #[error("storage provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for MarketError {
    fn from(e: reqwest::Error) -> Self {
        MarketError::Http(e.to_string())
    }
}

impl From<MarketError> for UploadError {
    fn from(e: MarketError) -> Self {
        match e {
            MarketError::Http(msg) => UploadError::Network(msg),
            MarketError::Provider(msg) => UploadError::UploadExecution(msg),
            MarketError::Default(e) => UploadError::Other(e),
        }
    }
}

/// Opaque identifier for a logical grouping of uploads bound to one
/// provider relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub Uuid);

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DatasetId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DatasetId(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub endpoint: String,
}

/// Account balance on the market's payment rail, in atto units
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub available: u128,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AllowanceStatus {
    pub rate_allowance: u128,
    pub lockup_allowance: u128,
    pub sufficient: bool,
}

/// Events on the upload wire protocol's stream
///
/// Closed set of the known event kinds, with an explicit fallback arm for
/// forward compatibility with events this client does not recognize yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UploadEvent {
    Uploading,
    PieceAdded { piece_cid: String },
    PieceConfirmed { tx_hash: String },
    IndexAdvertising { retry_count: u32 },
    IndexConfirmed,
    IndexPending { retry_count: u32 },
    #[serde(other)]
    Unknown,
}

/// Market-wide operations: payments and context negotiation
#[async_trait]
pub trait StorageMarket: Send + Sync {
    async fn balance(&self) -> Result<Balance, MarketError>;

    /// Projected cost of storing `size_bytes`, in atto units
    async fn estimate_cost(&self, size_bytes: u64) -> Result<u128, MarketError>;

    async fn allowances(&self, required: u128) -> Result<AllowanceStatus, MarketError>;

    async fn approve_allowances(&self, required: u128) -> Result<(), MarketError>;

    /// Largest single upload the market accepts, in bytes
    async fn max_upload_size(&self) -> Result<u64, MarketError>;

    /// Bind the session to a provider and dataset. When `existing` is
    /// supplied, binds to that dataset instead of provisioning a new one.
    async fn create_context(
        &self,
        existing: Option<DatasetId>,
    ) -> Result<Arc<dyn StorageContext>, MarketError>;
}

/// A negotiated provider/dataset binding for one or more uploads
#[async_trait]
pub trait StorageContext: Send + Sync {
    fn provider_info(&self) -> ProviderInfo;

    fn dataset_id(&self) -> DatasetId;

    /// Stream the archive to the provider. Events arrive on the returned
    /// channel; the channel closes when the protocol finishes or fails.
    async fn upload(
        &self,
        archive: Bytes,
        root_cid: &Cid,
    ) -> Result<flume::Receiver<UploadEvent>, MarketError>;

    /// Request advertisement of a confirmed piece to the public index.
    async fn advertise_index(&self, piece_cid: &str) -> Result<(), MarketError>;

    /// Release the provider session.
    async fn close(&self) -> Result<(), MarketError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_upload_event_tags() {
        let event: UploadEvent =
            serde_json::from_str(r#"{"type":"piece-confirmed","tx_hash":"0xabc"}"#).unwrap();
        assert_eq!(
            event,
            UploadEvent::PieceConfirmed {
                tx_hash: "0xabc".to_string()
            }
        );
    }

    #[test]
    fn test_unrecognized_event_falls_back() {
        let event: UploadEvent =
            serde_json::from_str(r#"{"type":"piece-replicated"}"#).unwrap();
        assert_eq!(event, UploadEvent::Unknown);
    }
}
