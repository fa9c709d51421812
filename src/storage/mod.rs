//! On-disk snapshot format for a trained chain and its ingestion cursor.
//!
//! A state file is a bincode `SnapshotFile` envelope: magic, format version,
//! compression flag, crc32 of the stored payload bytes, and the payload itself
//! (a bincode `ChainSnapshot`, possibly LZ4-packed). The checksum is verified
//! before anything is unpacked. Files are replaced atomically through a
//! temporary file in the same directory.

pub mod compression;

use crate::chain::{ChainStore, PrefixKey, TransitionTable};
use bincode::{deserialize, serialize};
use compression::CompressionAlgorithm;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"MKCH";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("State file not found: {0}")]
    NotFound(PathBuf),
    #[error("State file {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("Unsupported state file version {0}")]
    UnsupportedVersion(u32),
    #[error("State file uses prefix length {found}, chain expects {expected}")]
    IncompatiblePrefix { expected: usize, found: usize },
    #[error("Failed to write state file {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization error: {0}")]
    Encode(#[from] bincode::Error),
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    magic: [u8; 4],
    version: u32,
    compression: CompressionAlgorithm,
    checksum: u32,
    payload: Vec<u8>,
}

/// Everything a chain persists: its shape, tables and cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub prefix_len: u32,
    pub since_id: u64,
    pub transitions: Vec<(PrefixKey, Vec<String>)>,
    pub openings: Vec<(PrefixKey, Vec<String>)>,
}

impl ChainSnapshot {
    /// Copies the store's tables, sorted by key so equal chains encode identically.
    pub fn capture(store: &ChainStore, since_id: u64) -> Self {
        Self {
            prefix_len: store.prefix_len() as u32,
            since_id,
            transitions: sorted_entries(store.transitions()),
            openings: sorted_entries(store.openings()),
        }
    }

    pub fn into_store(self) -> ChainStore {
        ChainStore::from_parts(
            self.prefix_len as usize,
            self.transitions.into_iter().collect(),
            self.openings.into_iter().collect(),
        )
    }
}

fn sorted_entries(table: &TransitionTable) -> Vec<(PrefixKey, Vec<String>)> {
    let mut entries: Vec<_> = table
        .iter()
        .map(|(key, nexts)| (key.clone(), nexts.clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// Serializes a snapshot into the versioned file envelope.
pub fn encode(
    snapshot: &ChainSnapshot,
    algorithm: CompressionAlgorithm,
) -> Result<Vec<u8>, StorageError> {
    let payload = serialize(snapshot)?;
    let packed = algorithm.compress(&payload);
    debug!(
        ?algorithm,
        original = payload.len(),
        stored = packed.len(),
        "encoded chain snapshot"
    );

    let file = SnapshotFile {
        magic: SNAPSHOT_MAGIC,
        version: SNAPSHOT_VERSION,
        compression: algorithm,
        checksum: crc32fast::hash(&packed),
        payload: packed,
    };
    Ok(serialize(&file)?)
}

/// Parses and verifies a file envelope. `path` is only used for error context.
pub fn decode(bytes: &[u8], path: &Path) -> Result<ChainSnapshot, StorageError> {
    let unreadable = |reason: String| StorageError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };

    let file: SnapshotFile = deserialize(bytes).map_err(|e| unreadable(e.to_string()))?;
    if file.magic != SNAPSHOT_MAGIC {
        return Err(unreadable("not a chain state file".to_string()));
    }
    if file.version != SNAPSHOT_VERSION {
        return Err(StorageError::UnsupportedVersion(file.version));
    }

    if crc32fast::hash(&file.payload) != file.checksum {
        return Err(unreadable("checksum mismatch".to_string()));
    }

    let payload = file.compression.decompress(&file.payload).map_err(unreadable)?;

    deserialize(&payload).map_err(|e| unreadable(e.to_string()))
}

/// Reads a state file, mapping a missing path to `NotFound`.
pub fn read_file(path: &Path) -> Result<Vec<u8>, StorageError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
        _ => StorageError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

/// Replaces `path` with `bytes` so readers only ever see a complete file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_failure = |source: io::Error| StorageError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failure)?;
    tmp.write_all(bytes).map_err(write_failure)?;
    tmp.as_file().sync_all().map_err(write_failure)?;
    tmp.persist(path).map_err(|e| write_failure(e.error))?;
    Ok(())
}
