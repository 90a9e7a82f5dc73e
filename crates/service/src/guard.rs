//! CID privacy protection
//!
//! For encrypted payloads the root content identifier is itself a
//! retrieval hint: anyone reading plaintext metadata could use it to
//! fetch the ciphertext from the storage network. So after a successful
//! encrypted upload the root CID is run through the same access-control
//! crypto service before it is persisted.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use common::access::EncryptionMetadata;
use common::crypto::SecretKey;
use common::linked_data::Cid;

use crate::error::{StageExt, UploadError};
use crate::threshold::CryptoService;

#[derive(Debug, Clone)]
pub struct ProtectedCid {
    /// Base64 ciphertext of the canonical CID string
    pub encrypted_root_cid: String,
    pub metadata: EncryptionMetadata,
}

/// Encrypt the root CID under the same self-only policy as the payload.
pub async fn protect_cid(
    crypto: &CryptoService,
    root_cid: &Cid,
    key: &SecretKey,
) -> Result<ProtectedCid, UploadError> {
    let (ciphertext, metadata) = crypto
        .encrypt(root_cid.to_string().as_bytes(), key)
        .await
        .stage("content identifier protection")?;

    Ok(ProtectedCid {
        encrypted_root_cid: BASE64.encode(ciphertext),
        metadata,
    })
}
