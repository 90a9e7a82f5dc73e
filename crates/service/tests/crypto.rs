//! Crypto service round trips through the fake threshold network

mod common;

use ::common::crypto::SecretKey;

use service::{decrypt_video, ProgressSink, UploadError};

#[tokio::test]
async fn test_encrypt_decrypt_round_trip() {
    let env = common::setup();
    let crypto = env.state.crypto();
    let payload = b"captured livestream segment".to_vec();

    let (ciphertext, metadata) = crypto.encrypt(&payload, &env.key).await.unwrap();
    assert_ne!(ciphertext, payload);

    let plaintext = crypto.decrypt(&ciphertext, &metadata, &env.key).await.unwrap();
    assert_eq!(plaintext, payload);
}

#[tokio::test]
async fn test_wrong_key_fails_with_authentication_error() {
    let env = common::setup();
    let crypto = env.state.crypto();
    let payload = b"not for other identities".to_vec();

    let (ciphertext, metadata) = crypto.encrypt(&payload, &env.key).await.unwrap();

    let other_key = SecretKey::generate();
    let err = crypto
        .decrypt(&ciphertext, &metadata, &other_key)
        .await
        .unwrap_err();

    // Never wrong plaintext; always a distinguishable authentication failure.
    assert!(matches!(err.root(), UploadError::Authentication(_)));
}

#[tokio::test]
async fn test_tampered_ciphertext_fails() {
    let env = common::setup();
    let crypto = env.state.crypto();

    let (mut ciphertext, metadata) = crypto
        .encrypt(b"integrity protected", &env.key)
        .await
        .unwrap();
    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0xFF;

    let err = crypto
        .decrypt(&ciphertext, &metadata, &env.key)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), UploadError::Authentication(_)));
}

#[tokio::test]
async fn test_malformed_metadata_is_a_metadata_error() {
    let env = common::setup();
    let crypto = env.state.crypto();

    let (ciphertext, mut metadata) = crypto.encrypt(b"payload", &env.key).await.unwrap();
    metadata.access_control_conditions.clear();

    let err = crypto
        .decrypt(&ciphertext, &metadata, &env.key)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), UploadError::Metadata(_)));
}

#[tokio::test]
async fn test_decrypt_video_entry_point() {
    let env = common::setup();
    let crypto = env.state.crypto();
    let payload = b"playback path".to_vec();

    let (ciphertext, metadata) = crypto.encrypt(&payload, &env.key).await.unwrap();
    let plaintext = decrypt_video(
        &env.state,
        &ciphertext,
        &metadata,
        &env.key,
        &ProgressSink::disabled(),
    )
    .await
    .unwrap();

    assert_eq!(plaintext, payload);
}

#[tokio::test]
async fn test_connection_is_shared_across_calls() {
    let env = common::setup();
    let crypto = env.state.crypto();

    crypto.encrypt(b"one", &env.key).await.unwrap();
    crypto.encrypt(b"two", &env.key).await.unwrap();
    assert_eq!(env.threshold.connect_count(), 1);
}

#[tokio::test]
async fn test_shutdown_tears_down_connection_once() {
    let env = common::setup();

    // Never connected: nothing to tear down.
    env.state.shutdown().await;
    assert_eq!(env.threshold.disconnect_count(), 0);

    env.state.crypto().encrypt(b"x", &env.key).await.unwrap();
    env.state.shutdown().await;
    assert_eq!(env.threshold.disconnect_count(), 1);
}
