//! Pipeline configuration

use url::Url;

use common::crypto::SecretKey;

use crate::error::UploadError;
use crate::market::DatasetId;

/// Chain the access-control predicates are declared for
pub const DEFAULT_CHAIN_ID: u64 = 314;

/// Process-wide configuration for the composition root
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// RPC endpoint of the storage market
    pub network_endpoint: Url,
    /// Endpoint of the threshold-cryptography network
    pub threshold_endpoint: Url,
    pub chain_id: u64,
}

impl ServiceConfig {
    pub fn new(network_endpoint: &str, threshold_endpoint: &str) -> Result<Self, UploadError> {
        let network_endpoint = Url::parse(network_endpoint).map_err(|e| {
            UploadError::Configuration(format!("invalid network endpoint: {}", e))
        })?;
        let threshold_endpoint = Url::parse(threshold_endpoint).map_err(|e| {
            UploadError::Configuration(format!("invalid threshold endpoint: {}", e))
        })?;
        Ok(Self {
            network_endpoint,
            threshold_endpoint,
            chain_id: DEFAULT_CHAIN_ID,
        })
    }
}

/// Per-invocation configuration carried in the upload request
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub identity_key: SecretKey,
    pub encryption_enabled: bool,
    pub existing_dataset_id: Option<DatasetId>,
    pub auto_configure_allowances: bool,
}

impl UploadConfig {
    pub fn new(identity_key: SecretKey, encryption_enabled: bool) -> Self {
        Self {
            identity_key,
            encryption_enabled,
            existing_dataset_id: None,
            auto_configure_allowances: true,
        }
    }

    /// Build from a hex-encoded private key, as supplied by configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Configuration`] if the key does not
    /// deserialize to a valid signing identity.
    pub fn from_hex_key(hex: &str, encryption_enabled: bool) -> Result<Self, UploadError> {
        let identity_key = SecretKey::from_hex(hex)
            .map_err(|e| UploadError::Configuration(format!("invalid identity key: {}", e)))?;
        Ok(Self::new(identity_key, encryption_enabled))
    }

    pub fn with_existing_dataset(mut self, dataset_id: DatasetId) -> Self {
        self.existing_dataset_id = Some(dataset_id);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bad_hex_key_is_a_configuration_error() {
        let err = UploadConfig::from_hex_key("not hex", true).unwrap_err();
        assert!(matches!(err, UploadError::Configuration(_)));
    }

    #[test]
    fn test_bad_endpoint_is_a_configuration_error() {
        let err = ServiceConfig::new("not a url", "http://localhost:9000/").unwrap_err();
        assert!(matches!(err, UploadError::Configuration(_)));
    }
}
