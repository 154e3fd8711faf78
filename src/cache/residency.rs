//! Cache residency set.
//!
//! A [`ResidencySet`] maps segment ids to fully loaded payloads. Entries are
//! inserted only after their payload has been read and verified, so a
//! lookup never observes a half-loaded segment. Readers receive a
//! [`SegmentHandle`], an `Arc` snapshot that stays valid after the segment
//! is evicted.

use crate::catalog::segments::{SegmentDescriptor, SegmentId};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A loaded segment.
#[derive(Debug)]
pub struct ResidentSegment {
    descriptor: SegmentDescriptor,
    data: Bytes,
    loaded_at: Instant,
}

impl ResidentSegment {
    /// Wrap a loaded payload.
    pub fn new(descriptor: SegmentDescriptor, data: Bytes) -> Self {
        Self {
            descriptor,
            data,
            loaded_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SegmentId {
        self.descriptor.id
    }

    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Segment payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Bytes charged against cache capacity.
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Time since the payload was loaded.
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }
}

/// Shared reader snapshot of a resident segment.
pub type SegmentHandle = Arc<ResidentSegment>;

/// One residency entry.
#[derive(Debug)]
pub struct ResidencyEntry {
    handle: SegmentHandle,
    /// Value of the set's access clock at the last lookup.
    last_access: AtomicU64,
    /// Set by forced loads; held entries are never chosen by ordinary eviction.
    held: bool,
}

impl ResidencyEntry {
    pub fn handle(&self) -> &SegmentHandle {
        &self.handle
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Number of reader handles outstanding besides the set's own.
    pub fn reader_count(&self) -> usize {
        Arc::strong_count(&self.handle).saturating_sub(1)
    }

    pub fn size_bytes(&self) -> u64 {
        self.handle.size_bytes()
    }
}

/// Set of resident segments with byte accounting.
///
/// Not synchronized; the cache controller owns the only instance and guards
/// it with its own lock.
#[derive(Debug, Default)]
pub struct ResidencySet {
    entries: HashMap<SegmentId, ResidencyEntry>,
    usage_bytes: u64,
    clock: AtomicU64,
}

impl ResidencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a loaded segment, replacing any previous entry for its id.
    pub fn insert(&mut self, segment: ResidentSegment, held: bool) -> SegmentHandle {
        let handle = Arc::new(segment);
        let entry = ResidencyEntry {
            handle: Arc::clone(&handle),
            last_access: AtomicU64::new(self.tick()),
            held,
        };
        self.usage_bytes += entry.size_bytes();
        if let Some(previous) = self.entries.insert(handle.id(), entry) {
            self.usage_bytes -= previous.size_bytes();
        }
        handle
    }

    /// Remove a segment, returning its entry.
    pub fn remove(&mut self, id: SegmentId) -> Option<ResidencyEntry> {
        let entry = self.entries.remove(&id)?;
        self.usage_bytes -= entry.size_bytes();
        Some(entry)
    }

    /// Look up a segment and record the access.
    pub fn touch(&self, id: SegmentId) -> Option<SegmentHandle> {
        let entry = self.entries.get(&id)?;
        entry.last_access.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.handle))
    }

    /// Look up an entry without recording an access.
    pub fn get(&self, id: SegmentId) -> Option<&ResidencyEntry> {
        self.entries.get(&id)
    }

    /// Mark or unmark a segment as held. Returns false if not resident.
    pub fn set_held(&mut self, id: SegmentId, held: bool) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.held = held;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total payload bytes resident.
    pub fn usage_bytes(&self) -> u64 {
        self.usage_bytes
    }

    pub fn held_count(&self) -> usize {
        self.entries.values().filter(|e| e.held).count()
    }

    /// Resident ids in ascending order.
    pub fn ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SegmentId, &ResidencyEntry)> {
        self.entries.iter()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}
