//! Content addressing helpers
//!
//! A thin wrapper around the multiformats stack: CID computation over
//! sha2-256 multihashes, plus dag-cbor encoding for linked structures.
//! CIDs render in their canonical base32 string form.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Multicodec for raw byte blocks
pub const RAW_CODEC: u64 = 0x55;
/// Multicodec for dag-cbor blocks
pub const DAG_CBOR_CODEC: u64 = 0x71;
/// Multihash code for sha2-256
const SHA2_256_CODE: u64 = 0x12;

/// Errors that can occur while computing or parsing content identifiers
#[derive(Debug, thiserror::Error)]
pub enum CidError {
    #[error("cid error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A content identifier
///
/// Thin wrapper around `cid::Cid` pinned to CIDv1 + sha2-256, with a
/// string-based serde representation so identifiers stay readable in
/// persisted metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(cid::Cid);

impl Deref for Cid {
    type Target = cid::Cid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<cid::Cid> for Cid {
    fn from(cid: cid::Cid) -> Self {
        Cid(cid)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cid {
    type Err = CidError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner =
            cid::Cid::try_from(s).map_err(|e| anyhow::anyhow!("invalid cid string: {}", e))?;
        Ok(Cid(inner))
    }
}

impl serde::Serialize for Cid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Cid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Cid::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Cid {
    /// Compute the CIDv1 of a block of bytes under the given codec
    pub fn compute(codec: u64, data: &[u8]) -> Result<Self, CidError> {
        let digest = Sha256::digest(data);
        let hash = multihash::Multihash::<64>::wrap(SHA2_256_CODE, &digest)
            .map_err(|e| anyhow::anyhow!("multihash wrap error: {}", e))?;
        Ok(Cid(cid::Cid::new_v1(codec, hash)))
    }

    /// The raw underlying cid, for dag-cbor link encoding
    pub fn inner(&self) -> cid::Cid {
        self.0
    }
}

/// Encode a value as dag-cbor bytes
pub fn encode_dag_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CidError> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| anyhow::anyhow!("dag-cbor encode: {}", e).into())
}

/// Decode a value from dag-cbor bytes
pub fn decode_dag_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CidError> {
    serde_ipld_dagcbor::from_slice(bytes)
        .map_err(|e| anyhow::anyhow!("dag-cbor decode: {}", e).into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_compute_is_deterministic() {
        let a = Cid::compute(RAW_CODEC, b"hello world").unwrap();
        let b = Cid::compute(RAW_CODEC, b"hello world").unwrap();
        assert_eq!(a, b);

        let c = Cid::compute(RAW_CODEC, b"hello world!").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_codec_changes_cid() {
        let raw = Cid::compute(RAW_CODEC, b"data").unwrap();
        let cbor = Cid::compute(DAG_CBOR_CODEC, b"data").unwrap();
        assert_ne!(raw, cbor);
    }

    #[test]
    fn test_string_round_trip() {
        let cid = Cid::compute(RAW_CODEC, b"round trip").unwrap();
        let s = cid.to_string();
        let recovered = Cid::from_str(&s).unwrap();
        assert_eq!(cid, recovered);
    }

    #[test]
    fn test_serde_as_string() {
        let cid = Cid::compute(RAW_CODEC, b"serde").unwrap();
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{}\"", cid));
        let back: Cid = serde_json::from_str(&json).unwrap();
        assert_eq!(cid, back);
    }
}
