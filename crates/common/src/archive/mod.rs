//! Content-addressed archive (CAR) construction
//!
//! Converts a source byte stream into a CARv1 archive and computes its root
//! content identifier. The payload is chunked into fixed-size raw blocks,
//! the chunks are linked under a dag-cbor root node, and the whole thing is
//! written as a varint-framed CAR stream. Construction is a pure transform:
//! identical input bytes always produce an identical root CID.
//!
//! The CAR format requires a seekable file source, so payloads that only
//! exist in memory (freshly encrypted) are first spilled to a private temp
//! file. Every file this module creates is registered with the caller's
//! [`CleanupGuard`] at creation time.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::cleanup::CleanupGuard;
use crate::linked_data::{encode_dag_cbor, Cid, CidError, DAG_CBOR_CODEC, RAW_CODEC};

/// Chunk size for payload blocks
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Errors that can occur during archive construction
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("archive i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cid error: {0}")]
    Cid(#[from] CidError),
}

/// Where the payload comes from
#[derive(Debug)]
pub enum ArchiveSource<'a> {
    /// Payload already exists on disk (unencrypted original file)
    Path(&'a Path),
    /// Payload only exists in memory (freshly encrypted)
    Bytes(&'a [u8]),
}

/// A built archive and its identifiers
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    /// Full CAR stream
    pub archive_bytes: Bytes,
    /// Deterministic root identifier of the archive contents
    pub root_cid: Cid,
    /// Where the CAR was written (temp artifact, guard-registered)
    pub archive_path: PathBuf,
    /// Size of the CAR stream in bytes
    pub size_bytes: u64,
}

/// CARv1 stream header
#[derive(Debug, Serialize, Deserialize)]
struct CarHeader {
    version: u64,
    roots: Vec<cid::Cid>,
}

/// Root node linking payload chunks, encoded as dag-cbor
#[derive(Debug, Serialize, Deserialize)]
struct RootNode {
    chunks: Vec<cid::Cid>,
    size: u64,
}

/// Build a CAR archive from the given source.
///
/// Memory payloads are spilled to a temp file in `scratch_dir` first (the
/// archive pass needs a seekable source); both the spill file and the
/// written archive are registered with `guard` immediately on creation.
///
/// # Errors
///
/// Any I/O or encoding error aborts the build; partially written files are
/// removed by the guard at pipeline teardown.
pub async fn build(
    source: ArchiveSource<'_>,
    scratch_dir: &Path,
    guard: &mut CleanupGuard,
) -> Result<ArchiveResult, ArchiveError> {
    let source_path = match source {
        ArchiveSource::Path(path) => path.to_path_buf(),
        ArchiveSource::Bytes(bytes) => spill_to_temp(bytes, scratch_dir, guard).await?,
    };

    let (chunks, total_size) = chunk_file(&source_path).await?;
    tracing::debug!(
        chunks = chunks.len(),
        size = total_size,
        "chunked archive payload"
    );

    let root_node = RootNode {
        chunks: chunks.iter().map(|(cid, _)| cid.inner()).collect(),
        size: total_size,
    };
    let root_bytes = encode_dag_cbor(&root_node)?;
    let root_cid = Cid::compute(DAG_CBOR_CODEC, &root_bytes)?;

    let archive_path = scratch_dir.join(format!("{}.car", root_cid));
    {
        let path = archive_path.clone();
        guard.register("archive file", move || async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        });
    }

    let archive_bytes = write_car(&root_cid, &root_bytes, &chunks)?;
    tokio::fs::write(&archive_path, &archive_bytes).await?;

    let size_bytes = archive_bytes.len() as u64;
    Ok(ArchiveResult {
        archive_bytes: Bytes::from(archive_bytes),
        root_cid,
        archive_path,
        size_bytes,
    })
}

/// Remove a written archive file.
pub async fn cleanup(archive_path: &Path) -> Result<(), ArchiveError> {
    match tokio::fs::remove_file(archive_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn spill_to_temp(
    bytes: &[u8],
    scratch_dir: &Path,
    guard: &mut CleanupGuard,
) -> Result<PathBuf, ArchiveError> {
    let temp = tempfile::Builder::new()
        .prefix("streamvault-payload-")
        .suffix(".bin")
        .tempfile_in(scratch_dir)?;
    let path = temp.into_temp_path().keep().map_err(|e| e.error)?;

    {
        let path = path.clone();
        guard.register("payload temp file", move || async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        });
    }

    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Read the source file into fixed-size chunks, computing each chunk's raw CID
async fn chunk_file(path: &Path) -> Result<(Vec<(Cid, Vec<u8>)>, u64), ArchiveError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut chunks = Vec::new();
    let mut total: u64 = 0;

    loop {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut filled = 0;
        while filled < CHUNK_SIZE {
            let n = file.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        buffer.truncate(filled);
        total += filled as u64;
        let cid = Cid::compute(RAW_CODEC, &buffer)?;
        chunks.push((cid, buffer));
        if filled < CHUNK_SIZE {
            break;
        }
    }

    Ok((chunks, total))
}

/// Assemble the CARv1 stream: header, root block, then payload blocks
fn write_car(
    root_cid: &Cid,
    root_bytes: &[u8],
    chunks: &[(Cid, Vec<u8>)],
) -> Result<Vec<u8>, ArchiveError> {
    let header = CarHeader {
        version: 1,
        roots: vec![root_cid.inner()],
    };
    let header_bytes = encode_dag_cbor(&header)?;

    let mut out = Vec::new();
    write_varint_frame(&mut out, &[&header_bytes]);
    write_block(&mut out, root_cid, root_bytes);
    for (cid, data) in chunks {
        write_block(&mut out, cid, data);
    }
    Ok(out)
}

fn write_block(out: &mut Vec<u8>, cid: &Cid, data: &[u8]) {
    let cid_bytes = cid.inner().to_bytes();
    write_varint_frame(out, &[&cid_bytes, data]);
}

fn write_varint_frame(out: &mut Vec<u8>, parts: &[&[u8]]) {
    let len: u64 = parts.iter().map(|p| p.len() as u64).sum();
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(len, &mut buf));
    for part in parts {
        out.extend_from_slice(part);
    }
}
