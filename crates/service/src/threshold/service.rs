use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use common::access::{AccessCondition, EncryptionMetadata};
use common::crypto::SecretKey;

use super::{
    DecryptRequest, EncryptRequest, SessionRequest, ThresholdHandle, DECRYPT_CAPABILITY,
};
use crate::error::UploadError;

/// Policy-bound encryption and decryption through the threshold network
///
/// Idempotent per call; holds no mutable state beyond the shared
/// [`ThresholdHandle`].
#[derive(Clone)]
pub struct CryptoService {
    handle: ThresholdHandle,
    chain_id: u64,
}

impl CryptoService {
    pub fn new(handle: ThresholdHandle, chain_id: u64) -> Self {
        Self { handle, chain_id }
    }

    pub fn handle(&self) -> &ThresholdHandle {
        &self.handle
    }

    /// Encrypt a buffer under the self-only access policy.
    ///
    /// Derives the public identity from the secret key, constructs the
    /// single "only this identity may decrypt" predicate, and sends the
    /// plaintext to the network. The returned metadata carries everything
    /// decryption needs and never the ciphertext itself.
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        key: &SecretKey,
    ) -> Result<(Vec<u8>, EncryptionMetadata), UploadError> {
        let network = self.handle.network().await?;

        let conditions = vec![AccessCondition::identity_only(&key.public(), self.chain_id)];
        let request = EncryptRequest {
            payload: BASE64.encode(plaintext),
            access_control_conditions: conditions.clone(),
            chain_id: self.chain_id,
        };
        let response = network.encrypt(request).await?;

        let ciphertext = BASE64
            .decode(&response.ciphertext)
            .map_err(|e| UploadError::Network(format!("invalid ciphertext encoding: {}", e)))?;
        tracing::debug!(
            size = ciphertext.len(),
            content_hash = %response.content_hash,
            "payload encrypted"
        );

        Ok((
            ciphertext,
            EncryptionMetadata {
                content_hash: response.content_hash,
                access_control_conditions: conditions,
                chain_id: self.chain_id,
            },
        ))
    }

    /// Decrypt a buffer previously encrypted under stored metadata.
    ///
    /// Obtains short-lived session credentials first: signs the network's
    /// challenge with the identity key and exchanges the signature for a
    /// session scoped to exactly the decryption capability.
    pub async fn decrypt(
        &self,
        ciphertext: &[u8],
        metadata: &EncryptionMetadata,
        key: &SecretKey,
    ) -> Result<Vec<u8>, UploadError> {
        metadata.validate()?;
        let network = self.handle.network().await?;

        let challenge = network.challenge().await?;
        let signature = key.sign(challenge.challenge.as_bytes());
        let session = network
            .authorize(SessionRequest {
                identity: key.public().to_hex(),
                challenge: challenge.challenge,
                signature: hex::encode(signature.to_bytes()),
                capability: DECRYPT_CAPABILITY.to_string(),
            })
            .await?;

        let request = DecryptRequest {
            ciphertext: BASE64.encode(ciphertext),
            content_hash: metadata.content_hash.clone(),
            access_control_conditions: metadata.access_control_conditions.clone(),
            chain_id: metadata.chain_id,
            session,
        };
        let response = network.decrypt(request).await?;

        BASE64
            .decode(&response.payload)
            .map_err(|e| UploadError::Authentication(format!("invalid plaintext encoding: {}", e)))
    }
}
