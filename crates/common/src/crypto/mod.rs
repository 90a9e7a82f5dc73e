//! Cryptographic primitives for StreamVault
//!
//! This module provides the identity layer for the upload pipeline:
//!
//! - **Identity**: Ed25519 keypairs derived from the account's private key
//! - **Session authorization**: challenge signing for the threshold network
//!
//! # Security Model
//!
//! The uploading account holds an Ed25519 keypair (`SecretKey`/`PublicKey`).
//! The public key is the identity referenced by access-control predicates;
//! the secret key signs session challenges when decryption rights must be
//! proven to the threshold network. Content encryption itself is performed
//! remotely by the threshold network and never touches key material here.

mod keys;

pub use ed25519_dalek::Signature;
pub use keys::{PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}
