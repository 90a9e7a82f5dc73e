//! Shared test utilities for pipeline integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use common::crypto::SecretKey;
use service::testkit::{
    test_state, FakeStorageMarket, FakeThresholdNetwork, MemoryMetadataStore,
};
use service::{
    ProgressSink, ProgressStage, ProgressUpdate, State, UploadConfig, UploadRequest, UploadSource,
};

pub struct TestEnv {
    pub state: State,
    pub threshold: Arc<FakeThresholdNetwork>,
    pub market: Arc<FakeStorageMarket>,
    pub store: Arc<MemoryMetadataStore>,
    pub key: SecretKey,
}

/// Set up a test environment with every fake in its happy-path state
pub fn setup() -> TestEnv {
    setup_with_market(FakeStorageMarket::ready())
}

pub fn setup_with_market(market: Arc<FakeStorageMarket>) -> TestEnv {
    let threshold = FakeThresholdNetwork::new();
    let store = MemoryMetadataStore::new();
    let state = test_state(threshold.clone(), market.clone(), store.clone());
    TestEnv {
        state,
        threshold,
        market,
        store,
        key: SecretKey::generate(),
    }
}

/// A deliberately non-trivial payload spanning several archive chunks
pub fn sample_payload() -> Vec<u8> {
    (0..(3 * 256 * 1024 + 17)).map(|i| (i % 251) as u8).collect()
}

pub fn request(env: &TestEnv, payload: Vec<u8>, encrypt: bool) -> UploadRequest {
    UploadRequest {
        source: UploadSource::Bytes(payload),
        original_path: Some(PathBuf::from("/captures/stream.mp4")),
        config: UploadConfig::new(env.key.clone(), encrypt),
    }
}

/// A progress sink that records every update for later assertions
pub fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let updates = updates.clone();
        ProgressSink::new(Arc::new(move |update| updates.lock().push(update)))
    };
    (sink, updates)
}

/// Index of the first update at `stage`, panicking if it never fired
pub fn stage_index(updates: &[ProgressUpdate], stage: ProgressStage) -> usize {
    updates
        .iter()
        .position(|u| u.stage == stage)
        .unwrap_or_else(|| panic!("stage {:?} never reported", stage))
}
