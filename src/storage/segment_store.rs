//! Segment payload storage.
//!
//! The cache controller reads segment payloads through [`SegmentLoader`].
//! [`FileSegmentStore`] keeps one file per segment under
//! `<storage_dir>/segments/<id>.seg`; [`MemorySegmentStore`] keeps payloads
//! in memory and supports fault injection for tests.
//!
//! When the catalog records a checksum for a segment, the payload read from
//! storage is verified against it before it is handed to the cache.

use crate::catalog::segments::{SegmentDescriptor, SegmentId};
use crate::core::error::CacheError;
use anyhow::{Context, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hasher;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use twox_hash::XxHash64;

/// Seed for segment payload checksums.
pub const CHECKSUM_SEED: u64 = 0;

/// Compute the checksum recorded for a segment payload.
pub fn segment_checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(CHECKSUM_SEED);
    hasher.write(data);
    hasher.finish()
}

/// Verify `data` against the descriptor's recorded checksum, if any.
pub fn verify_checksum(descriptor: &SegmentDescriptor, data: &[u8]) -> Result<(), CacheError> {
    if let Some(expected) = descriptor.checksum {
        let actual = segment_checksum(data);
        if actual != expected {
            return Err(CacheError::Corrupt {
                segment: descriptor.id,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Source of segment payloads.
pub trait SegmentLoader: Send + Sync {
    /// Read and verify one segment's payload.
    fn read_segment(&self, descriptor: &SegmentDescriptor) -> Result<Bytes, CacheError>;
}

/// File-backed segment store.
#[derive(Debug, Clone)]
pub struct FileSegmentStore {
    storage_dir: PathBuf,
    segment_dir: PathBuf,
}

impl FileSegmentStore {
    /// Create a store rooted at `storage_dir`.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        let storage_dir = storage_dir.into();
        let segment_dir = storage_dir.join("segments");
        Self {
            storage_dir,
            segment_dir,
        }
    }

    /// Storage root.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Directory holding segment files.
    pub fn segment_dir(&self) -> &Path {
        &self.segment_dir
    }

    /// Path of one segment's file.
    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        self.segment_dir.join(format!("{id}.seg"))
    }

    /// Create the directory layout.
    pub fn initialize(&self) -> Result<()> {
        std::fs::create_dir_all(&self.storage_dir).context("failed to create storage directory")?;
        std::fs::create_dir_all(&self.segment_dir)
            .context("failed to create segment directory")?;
        tracing::debug!(path = %self.segment_dir.display(), "segment store initialized");
        Ok(())
    }

    /// Write a segment payload, returning its checksum.
    pub fn write_segment(&self, id: SegmentId, data: &[u8]) -> Result<u64> {
        let path = self.segment_path(id);
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write segment file: {}", path.display()))?;
        Ok(segment_checksum(data))
    }
}

impl SegmentLoader for FileSegmentStore {
    fn read_segment(&self, descriptor: &SegmentDescriptor) -> Result<Bytes, CacheError> {
        let path = self.segment_path(descriptor.id);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CacheError::Missing {
                    segment: descriptor.id,
                })
            }
            Err(err) => return Err(CacheError::io(descriptor.id, err)),
        };

        if data.len() as u64 != descriptor.size_bytes {
            tracing::warn!(
                segment = %descriptor.id,
                recorded = descriptor.size_bytes,
                actual = data.len(),
                "segment size differs from catalog record"
            );
        }
        verify_checksum(descriptor, &data)?;
        Ok(Bytes::from(data))
    }
}

/// Fault a [`MemorySegmentStore`] reports for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    Io,
    Missing,
}

/// In-memory segment store.
///
/// Payloads are either stored explicitly with [`MemorySegmentStore::put`] or,
/// in synthetic mode, generated on demand as `size_bytes` of filler.
#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    payloads: RwLock<HashMap<SegmentId, Bytes>>,
    faults: RwLock<HashMap<SegmentId, StoreFault>>,
    synthetic: bool,
    reads: AtomicU64,
}

impl MemorySegmentStore {
    /// Store that only serves explicitly stored payloads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that fabricates a payload for any segment it does not hold.
    pub fn synthetic() -> Self {
        Self {
            synthetic: true,
            ..Self::default()
        }
    }

    /// Store a payload.
    pub fn put(&self, id: SegmentId, data: impl Into<Bytes>) {
        self.payloads.write().insert(id, data.into());
    }

    /// Make reads of `id` fail until [`MemorySegmentStore::clear_fault`].
    pub fn inject_fault(&self, id: SegmentId, fault: StoreFault) {
        self.faults.write().insert(id, fault);
    }

    /// Remove an injected fault.
    pub fn clear_fault(&self, id: SegmentId) {
        self.faults.write().remove(&id);
    }

    /// Number of reads that reached the store, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl SegmentLoader for MemorySegmentStore {
    fn read_segment(&self, descriptor: &SegmentDescriptor) -> Result<Bytes, CacheError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let id = descriptor.id;
        match self.faults.read().get(&id) {
            Some(StoreFault::Io) => {
                return Err(CacheError::io(
                    id,
                    std::io::Error::new(ErrorKind::Other, "injected read failure"),
                ))
            }
            Some(StoreFault::Missing) => return Err(CacheError::Missing { segment: id }),
            None => {}
        }

        let data = match self.payloads.read().get(&id) {
            Some(data) => data.clone(),
            None if self.synthetic => Bytes::from(vec![0u8; descriptor.size_bytes as usize]),
            None => return Err(CacheError::Missing { segment: id }),
        };
        verify_checksum(descriptor, &data)?;
        Ok(data)
    }
}
