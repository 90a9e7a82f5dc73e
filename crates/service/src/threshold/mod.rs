//! Access-control crypto service
//!
//! Encrypts and decrypts byte buffers under a policy tied to the account's
//! identity, delegating the actual cryptography to a remote threshold
//! network. The network is consumed through the [`ThresholdNetwork`] trait
//! so tests can substitute a fake; the production implementation is a
//! JSON-over-HTTP client.
//!
//! The connection is process-wide: [`ThresholdHandle`] connects lazily on
//! first use, is safe to share across concurrent pipeline invocations, and
//! is explicitly torn down at process shutdown.

mod handle;
mod http;
mod service;

pub use handle::{ThresholdHandle, CONNECT_TIMEOUT};
pub use http::HttpThresholdNetwork;
pub use service::CryptoService;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::access::AccessCondition;

use crate::error::UploadError;

/// The one session capability the pipeline ever requests
pub const DECRYPT_CAPABILITY: &str = "decrypt";

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold network error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("threshold network http error: {0}")]
    Http(String),
    #[error("session authorization rejected: {0}")]
    Session(String),
    #[error("threshold network connect timed out after {0:?}")]
    ConnectTimeout(Duration),
}

impl From<reqwest::Error> for ThresholdError {
    fn from(e: reqwest::Error) -> Self {
        ThresholdError::Http(e.to_string())
    }
}

impl From<ThresholdError> for UploadError {
    fn from(e: ThresholdError) -> Self {
        match e {
            ThresholdError::Http(msg) => UploadError::Network(msg),
            ThresholdError::Session(msg) => UploadError::Authentication(msg),
            ThresholdError::ConnectTimeout(duration) => UploadError::Timeout(duration),
            ThresholdError::Default(e) => UploadError::Other(e),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Base64-encoded plaintext
    pub payload: String,
    pub access_control_conditions: Vec<AccessCondition>,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Base64-encoded ciphertext
    pub ciphertext: String,
    /// Hash of the plaintext, echoed back at decryption time
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Hex identity requesting the session
    pub identity: String,
    /// The challenge being answered
    pub challenge: String,
    /// Hex signature over the challenge bytes
    pub signature: String,
    /// Capability the session is scoped to
    pub capability: String,
}

/// Short-lived credentials scoped to exactly one capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub token: String,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Base64-encoded ciphertext
    pub ciphertext: String,
    pub content_hash: String,
    pub access_control_conditions: Vec<AccessCondition>,
    pub chain_id: u64,
    pub session: SessionCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Base64-encoded plaintext
    pub payload: String,
}

/// Remote threshold-cryptography network
///
/// Implementations perform no automatic retries; failures are returned to
/// the caller, which may retry with corrected input.
#[async_trait]
pub trait ThresholdNetwork: Send + Sync {
    async fn connect(&self) -> Result<(), ThresholdError>;
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, ThresholdError>;
    async fn challenge(&self) -> Result<Challenge, ThresholdError>;
    async fn authorize(&self, request: SessionRequest)
        -> Result<SessionCredentials, ThresholdError>;
    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, ThresholdError>;
    async fn disconnect(&self) -> Result<(), ThresholdError>;
}
