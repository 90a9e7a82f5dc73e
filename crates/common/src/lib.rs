/**
 * Access-control metadata attached to encrypted
 *  payloads: policy predicates and the storage-safe
 *  serialization guard.
 */
pub mod access;
/**
 * Content-addressed archive (CAR) construction.
 * Chunks a seekable source into raw blocks, links
 *  them under a root node, and writes a CARv1
 *  stream with a deterministic root CID.
 */
pub mod archive;
/**
 * Deferred resource cleanup. A guard collects
 *  release actions at acquisition time and drains
 *  them in reverse order at pipeline teardown,
 *  on both success and failure paths.
 */
pub mod cleanup;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - Challenge signing for session authorization
 */
pub mod crypto;
/**
 * Internal wrapper around IPLD, renamed to
 *  something a little more down-to-earth.
 * Handles CID computation and dag-cbor encoding
 *  for linked data.
 */
pub mod linked_data;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::access::{AccessCondition, EncryptionMetadata, MetadataError};
    pub use crate::archive::{ArchiveResult, ArchiveSource};
    pub use crate::cleanup::CleanupGuard;
    pub use crate::crypto::{PublicKey, SecretKey};
    pub use crate::linked_data::{Cid, CidError};
    pub use crate::version::build_info;
}
