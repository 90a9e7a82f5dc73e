//! Access-control metadata for encrypted payloads
//!
//! When a payload is encrypted by the threshold network, the network returns
//! a content hash and the caller records the policy predicates the ciphertext
//! was bound to. That record is [`EncryptionMetadata`]. It is everything a
//! future decryption call needs, and deliberately nothing more: the
//! ciphertext itself lives only in the uploaded archive, never in metadata,
//! so that metadata channels cannot leak recoverable content.

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

/// Errors raised while handling stored encryption metadata
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Stored metadata failed to parse. Treated as probable data corruption;
    /// callers should not retry.
    #[error("stored encryption metadata is malformed: {0}")]
    Malformed(String),
    #[error("encryption metadata must never contain ciphertext")]
    CiphertextLeak,
}

/// A single access-control predicate enforced by the threshold network
///
/// The pipeline only ever constructs the self-only predicate ("only this
/// identity may decrypt"), but the list shape is preserved because the
/// network evaluates an ordered list of predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCondition {
    /// Chain the predicate is evaluated against
    pub chain_id: u64,
    /// Lookup the network performs, e.g. "identity"
    pub method: String,
    /// Comparison operator, e.g. "="
    pub comparator: String,
    /// Expected value, e.g. the hex identity allowed to decrypt
    pub value: String,
}

impl AccessCondition {
    /// The predicate granting decryption rights to exactly one identity
    pub fn identity_only(identity: &PublicKey, chain_id: u64) -> Self {
        Self {
            chain_id,
            method: "identity".to_string(),
            comparator: "=".to_string(),
            value: identity.to_hex(),
        }
    }
}

/// Everything needed to request decryption of a previously encrypted payload
///
/// Invariant: never contains the ciphertext. The storage-serialization
/// helpers below enforce this against regressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    /// Hash of the plaintext as reported by the threshold network
    pub content_hash: String,
    /// Ordered policy predicates the ciphertext was bound to
    pub access_control_conditions: Vec<AccessCondition>,
    /// Chain the predicates were declared for
    pub chain_id: u64,
}

impl EncryptionMetadata {
    /// Serialize for the metadata store.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::CiphertextLeak`] if the serialized form would
    /// carry a `ciphertext` field.
    pub fn to_storage_json(&self) -> Result<serde_json::Value, MetadataError> {
        let value = serde_json::to_value(self)
            .map_err(|e| MetadataError::Malformed(e.to_string()))?;
        Self::validate_storage_json(&value)?;
        Ok(value)
    }

    /// Parse metadata previously serialized with [`Self::to_storage_json`].
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::CiphertextLeak`] for objects carrying a
    /// `ciphertext` field and [`MetadataError::Malformed`] for anything that
    /// does not parse back into valid metadata.
    pub fn from_storage_json(value: &serde_json::Value) -> Result<Self, MetadataError> {
        Self::validate_storage_json(value)?;
        serde_json::from_value(value.clone()).map_err(|e| MetadataError::Malformed(e.to_string()))
    }

    /// Reject any stored object that carries a `ciphertext` key.
    pub fn validate_storage_json(value: &serde_json::Value) -> Result<(), MetadataError> {
        match value.as_object() {
            Some(map) if map.contains_key("ciphertext") => Err(MetadataError::CiphertextLeak),
            Some(_) => Ok(()),
            None => Err(MetadataError::Malformed(
                "expected a JSON object".to_string(),
            )),
        }
    }

    /// Sanity-check metadata loaded from storage before using it for
    /// decryption.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.content_hash.is_empty() {
            return Err(MetadataError::Malformed("empty content hash".to_string()));
        }
        if self.access_control_conditions.is_empty() {
            return Err(MetadataError::Malformed(
                "no access control conditions".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;

    fn sample() -> EncryptionMetadata {
        let key = SecretKey::generate();
        EncryptionMetadata {
            content_hash: "abc123".to_string(),
            access_control_conditions: vec![AccessCondition::identity_only(&key.public(), 314)],
            chain_id: 314,
        }
    }

    #[test]
    fn test_storage_round_trip() {
        let metadata = sample();
        let value = metadata.to_storage_json().unwrap();
        let recovered = EncryptionMetadata::from_storage_json(&value).unwrap();
        assert_eq!(metadata, recovered);
    }

    #[test]
    fn test_ciphertext_field_rejected() {
        let metadata = sample();
        let mut value = metadata.to_storage_json().unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("ciphertext".to_string(), serde_json::json!("deadbeef"));

        assert!(matches!(
            EncryptionMetadata::validate_storage_json(&value),
            Err(MetadataError::CiphertextLeak)
        ));
        assert!(EncryptionMetadata::from_storage_json(&value).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_conditions() {
        let mut metadata = sample();
        metadata.access_control_conditions.clear();
        assert!(metadata.validate().is_err());
    }
}
