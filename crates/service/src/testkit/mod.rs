//! In-memory fakes for pipeline tests
//!
//! The fake threshold network performs real authenticated encryption keyed
//! from the policy identity, so round-trip and wrong-key properties hold
//! for real instead of being scripted. The fake storage market records
//! every call so tests can assert ordering and short-circuit behavior.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use common::crypto::PublicKey;
use common::linked_data::Cid;

use crate::market::{
    AllowanceStatus, Balance, DatasetId, MarketError, ProviderInfo, StorageContext, StorageMarket,
    UploadEvent,
};
use crate::persist::{MetadataStore, PersistError, UploadRecord};
use crate::state::State;
use crate::threshold::{
    Challenge, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse,
    SessionCredentials, SessionRequest, ThresholdError, ThresholdNetwork, DECRYPT_CAPABILITY,
};
use crate::config::ServiceConfig;

const NONCE_SIZE: usize = 12;
const SESSION_PREFIX: &str = "fake-session:";

/// Threshold network fake with genuine symmetric crypto
///
/// The content key is derived from the identity named in the access
/// conditions, so only a session authorized for that identity can produce
/// the right key. Tampered ciphertext fails AEAD authentication.
#[derive(Default)]
pub struct FakeThresholdNetwork {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    issued_challenges: Mutex<HashSet<String>>,
}

impl FakeThresholdNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::Relaxed)
    }

    fn content_key(identity: &str) -> [u8; 32] {
        let digest = Sha256::digest(format!("streamvault-fake-threshold:{}", identity).as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(digest.as_slice());
        key
    }
}

#[async_trait]
impl ThresholdNetwork for FakeThresholdNetwork {
    async fn connect(&self) -> Result<(), ThresholdError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, ThresholdError> {
        let plaintext = BASE64
            .decode(&request.payload)
            .map_err(|e| anyhow::anyhow!("bad payload encoding: {}", e))?;
        let identity = request
            .access_control_conditions
            .first()
            .map(|c| c.value.clone())
            .ok_or_else(|| anyhow::anyhow!("no access control conditions"))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&Self::content_key(&identity)));
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("nonce generation failed: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut ciphertext = cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        let mut out = nonce_bytes.to_vec();
        out.append(&mut ciphertext);
        Ok(EncryptResponse {
            ciphertext: BASE64.encode(out),
            content_hash: blake3::hash(&plaintext).to_hex().to_string(),
        })
    }

    async fn challenge(&self) -> Result<Challenge, ThresholdError> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| anyhow::anyhow!("challenge generation failed: {}", e))?;
        let challenge = hex::encode(bytes);
        self.issued_challenges.lock().insert(challenge.clone());
        Ok(Challenge { challenge })
    }

    async fn authorize(
        &self,
        request: SessionRequest,
    ) -> Result<SessionCredentials, ThresholdError> {
        if !self.issued_challenges.lock().remove(&request.challenge) {
            return Err(ThresholdError::Session("unknown challenge".to_string()));
        }
        if request.capability != DECRYPT_CAPABILITY {
            return Err(ThresholdError::Session(format!(
                "unsupported capability: {}",
                request.capability
            )));
        }
        let public_key = PublicKey::from_hex(&request.identity)
            .map_err(|_| ThresholdError::Session("unparseable identity".to_string()))?;
        let signature_bytes: [u8; 64] = hex::decode(&request.signature)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ThresholdError::Session("malformed signature".to_string()))?;
        let signature = common::crypto::Signature::from_bytes(&signature_bytes);
        public_key
            .verify(request.challenge.as_bytes(), &signature)
            .map_err(|_| ThresholdError::Session("signature share mismatch".to_string()))?;

        Ok(SessionCredentials {
            token: format!("{}{}", SESSION_PREFIX, request.identity),
            expires_at: 4_102_444_800,
        })
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, ThresholdError> {
        let session_identity = request
            .session
            .token
            .strip_prefix(SESSION_PREFIX)
            .ok_or_else(|| ThresholdError::Session("invalid session token".to_string()))?;
        let policy_identity = request
            .access_control_conditions
            .first()
            .map(|c| c.value.as_str())
            .ok_or_else(|| anyhow::anyhow!("no access control conditions"))?;
        if session_identity != policy_identity {
            return Err(ThresholdError::Session(
                "identity does not satisfy access control conditions".to_string(),
            ));
        }

        let ciphertext = BASE64
            .decode(&request.ciphertext)
            .map_err(|e| anyhow::anyhow!("bad ciphertext encoding: {}", e))?;
        if ciphertext.len() < NONCE_SIZE {
            return Err(ThresholdError::Session("ciphertext too short".to_string()));
        }
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&Self::content_key(policy_identity)));
        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        let plaintext = cipher
            .decrypt(nonce, &ciphertext[NONCE_SIZE..])
            .map_err(|_| ThresholdError::Session("signature share mismatch".to_string()))?;

        if blake3::hash(&plaintext).to_hex().to_string() != request.content_hash {
            return Err(ThresholdError::Session("content hash mismatch".to_string()));
        }

        Ok(DecryptResponse {
            payload: BASE64.encode(plaintext),
        })
    }

    async fn disconnect(&self) -> Result<(), ThresholdError> {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Storage market fake with scripted balances and recorded calls
pub struct FakeStorageMarket {
    balance: u128,
    price_per_byte: u128,
    allowance_ok: AtomicBool,
    approve_grants: bool,
    max_upload_size: u64,
    advert_failures: Arc<AtomicU32>,
    fail_upload_stream: Arc<AtomicBool>,
    scripted_events: Arc<Mutex<Option<Vec<UploadEvent>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeStorageMarket {
    fn base() -> Self {
        Self {
            balance: u128::MAX,
            price_per_byte: 1,
            allowance_ok: AtomicBool::new(true),
            approve_grants: true,
            max_upload_size: u64::MAX,
            advert_failures: Arc::new(AtomicU32::new(0)),
            fail_upload_stream: Arc::new(AtomicBool::new(false)),
            scripted_events: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A market where every check passes
    pub fn ready() -> Arc<Self> {
        Arc::new(Self::base())
    }

    /// A market whose balance can never cover a deal
    pub fn blocked_balance() -> Arc<Self> {
        Arc::new(Self {
            balance: 0,
            ..Self::base()
        })
    }

    /// A market whose allowances are unset; `approve_grants` controls
    /// whether auto-configuration fixes them
    pub fn without_allowances(approve_grants: bool) -> Arc<Self> {
        Arc::new(Self {
            allowance_ok: AtomicBool::new(false),
            approve_grants,
            ..Self::base()
        })
    }

    /// A market that rejects uploads above `max_upload_size`
    pub fn with_max_upload_size(max_upload_size: u64) -> Arc<Self> {
        Arc::new(Self {
            max_upload_size,
            ..Self::base()
        })
    }

    /// Fail the next `n` index-advertisement attempts
    pub fn set_advert_failures(&self, n: u32) {
        self.advert_failures.store(n, Ordering::Relaxed);
    }

    /// Close the upload event stream before piece confirmation
    pub fn set_fail_upload_stream(&self, fail: bool) {
        self.fail_upload_stream.store(fail, Ordering::Relaxed);
    }

    /// Replace the default event sequence for the next upload
    pub fn set_scripted_events(&self, events: Vec<UploadEvent>) {
        *self.scripted_events.lock() = Some(events);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn context_created(&self) -> bool {
        self.calls().iter().any(|c| c == "create_context")
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl StorageMarket for FakeStorageMarket {
    async fn balance(&self) -> Result<Balance, MarketError> {
        self.record("balance");
        Ok(Balance {
            available: self.balance,
        })
    }

    async fn estimate_cost(&self, size_bytes: u64) -> Result<u128, MarketError> {
        self.record("estimate_cost");
        Ok(size_bytes as u128 * self.price_per_byte)
    }

    async fn allowances(&self, _required: u128) -> Result<AllowanceStatus, MarketError> {
        self.record("allowances");
        let sufficient = self.allowance_ok.load(Ordering::Relaxed);
        Ok(AllowanceStatus {
            rate_allowance: if sufficient { u128::MAX } else { 0 },
            lockup_allowance: if sufficient { u128::MAX } else { 0 },
            sufficient,
        })
    }

    async fn approve_allowances(&self, _required: u128) -> Result<(), MarketError> {
        self.record("approve_allowances");
        if self.approve_grants {
            self.allowance_ok.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn max_upload_size(&self) -> Result<u64, MarketError> {
        self.record("max_upload_size");
        Ok(self.max_upload_size)
    }

    async fn create_context(
        &self,
        existing: Option<DatasetId>,
    ) -> Result<Arc<dyn StorageContext>, MarketError> {
        self.record("create_context");
        let dataset_id = existing.unwrap_or_else(|| DatasetId(Uuid::new_v4()));
        Ok(Arc::new(FakeStorageContext {
            dataset_id,
            advert_failures: self.advert_failures.clone(),
            fail_upload_stream: self.fail_upload_stream.clone(),
            scripted_events: self.scripted_events.clone(),
            calls: self.calls.clone(),
        }))
    }
}

pub struct FakeStorageContext {
    dataset_id: DatasetId,
    advert_failures: Arc<AtomicU32>,
    fail_upload_stream: Arc<AtomicBool>,
    scripted_events: Arc<Mutex<Option<Vec<UploadEvent>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StorageContext for FakeStorageContext {
    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "f0-test".to_string(),
            name: "test provider".to_string(),
            endpoint: "http://provider.test/".to_string(),
        }
    }

    fn dataset_id(&self) -> DatasetId {
        self.dataset_id
    }

    async fn upload(
        &self,
        _archive: Bytes,
        root_cid: &Cid,
    ) -> Result<flume::Receiver<UploadEvent>, MarketError> {
        self.calls.lock().push("upload".to_string());
        let (sender, receiver) = flume::unbounded();

        if self.fail_upload_stream.load(Ordering::Relaxed) {
            // Dropping the sender closes the stream before confirmation.
            return Ok(receiver);
        }

        let events = self.scripted_events.lock().take().unwrap_or_else(|| {
            let root = root_cid.to_string();
            let tx_digest = blake3::hash(root.as_bytes()).to_hex().to_string();
            vec![
                UploadEvent::Uploading,
                UploadEvent::PieceAdded {
                    piece_cid: format!("piece-{}", root),
                },
                UploadEvent::PieceConfirmed {
                    tx_hash: format!("0x{}", &tx_digest[..16]),
                },
            ]
        });
        for event in events {
            let _ = sender.send(event);
        }
        Ok(receiver)
    }

    async fn advertise_index(&self, _piece_cid: &str) -> Result<(), MarketError> {
        self.calls.lock().push("advertise_index".to_string());
        let remaining = self.advert_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.advert_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(MarketError::Provider(
                "index advertisement unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), MarketError> {
        self.calls.lock().push("close".to_string());
        Ok(())
    }
}

/// Metadata store fake with optional scripted failure
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<UploadRecord>>,
    fail: AtomicBool,
}

impl MemoryMetadataStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn records(&self) -> Vec<UploadRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save_upload(&self, record: &UploadRecord) -> Result<(), PersistError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(anyhow::anyhow!("metadata store unavailable").into());
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// A `State` wired entirely with fakes
pub fn test_state(
    threshold: Arc<FakeThresholdNetwork>,
    market: Arc<FakeStorageMarket>,
    store: Arc<MemoryMetadataStore>,
) -> State {
    let config = ServiceConfig::new("http://market.test/", "http://threshold.test/")
        .expect("static test endpoints parse");
    State::with_collaborators(config, threshold, market, store)
}
