//! Upload pipeline for StreamVault.
//!
//! This crate coordinates the encrypted content-addressed upload pipeline:
//! - Threshold-network crypto service (policy-bound encryption, session auth)
//! - Payment readiness validation against the storage market
//! - Storage context negotiation and upload execution with progress
//! - CID privacy protection for encrypted payloads
//! - Composition-root `State` owning the shared network handles

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod guard;
pub mod market;
pub mod payment;
pub mod persist;
pub mod pipeline;
pub mod progress;
pub mod state;
pub mod testkit;
pub mod threshold;

// Re-export key types for convenience
pub use config::{ServiceConfig, UploadConfig};
pub use error::UploadError;
pub use pipeline::{decrypt_video, upload_video, UploadOutcome, UploadRequest, UploadSource};
pub use progress::{ProgressPhase, ProgressSink, ProgressStage, ProgressUpdate};
pub use state::State;
