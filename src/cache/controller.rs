//! Cache controller: the only writer of segment residency.
//!
//! # Paths
//!
//! - **Forced**: [`CacheController::force_load`] and
//!   [`CacheController::force_release`] guarantee the requested residency
//!   regardless of capacity, holds or readers. They fail only on storage
//!   faults.
//! - **Ordinary**: [`CacheController::get_or_load`] admits a segment only if
//!   it fits after LRU eviction, and [`CacheController::evict`] trims usage
//!   back to capacity in the background.
//!
//! # Locking
//!
//! Every residency change for a segment happens under that segment's lock,
//! taken before the residency lock. Forced operations block on segment
//! locks; ordinary eviction only try-locks them and skips a segment whose
//! lock is busy, so a forced operation in flight always wins. A forced load
//! also marks its segments held, and ordinary eviction never removes a held
//! segment or one with outstanding reader handles. Only a forced release
//! clears a hold.

use crate::cache::eviction::{self, EvictionReport};
use crate::cache::residency::{ResidencySet, ResidentSegment, SegmentHandle};
use crate::catalog::segments::{SegmentDescriptor, SegmentId};
use crate::core::error::CacheError;
use crate::storage::segment_store::SegmentLoader;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of a forced batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForceReport {
    /// Segments named in the request.
    pub requested: usize,
    /// Segments whose residency changed.
    pub changed: usize,
    /// Segments already in the requested state.
    pub unchanged: usize,
    /// Payload bytes loaded or released.
    pub bytes: u64,
}

/// Point-in-time controller statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub resident_segments: usize,
    pub held_segments: usize,
    pub usage_bytes: u64,
    pub capacity_bytes: u64,
    pub forced_loads: u64,
    pub forced_releases: u64,
    pub evictions: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    forced_loads: AtomicU64,
    forced_releases: AtomicU64,
    evictions: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Segment cache controller.
pub struct CacheController {
    loader: Arc<dyn SegmentLoader>,
    capacity_bytes: u64,
    residency: RwLock<ResidencySet>,
    segment_locks: Mutex<HashMap<SegmentId, Arc<Mutex<()>>>>,
    counters: CacheCounters,
}

impl std::fmt::Debug for CacheController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheController")
            .field("capacity_bytes", &self.capacity_bytes)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CacheController {
    /// Create a controller reading payloads from `loader`.
    pub fn new(loader: Arc<dyn SegmentLoader>, capacity_bytes: u64) -> Self {
        Self {
            loader,
            capacity_bytes,
            residency: RwLock::new(ResidencySet::new()),
            segment_locks: Mutex::new(HashMap::new()),
            counters: CacheCounters::default(),
        }
    }

    /// Configured capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    // ------------------------------------------------------------------
    // Forced path
    // ------------------------------------------------------------------

    /// Make every listed segment resident and held.
    ///
    /// Capacity is not consulted. Segments are processed in order and the
    /// batch stops at the first storage fault; segments loaded before the
    /// fault stay resident.
    pub fn force_load(&self, segments: &[SegmentDescriptor]) -> Result<ForceReport, CacheError> {
        let mut report = ForceReport {
            requested: segments.len(),
            ..ForceReport::default()
        };

        for descriptor in segments {
            let loaded = self.with_segment_lock(descriptor.id, || -> Result<Option<u64>, CacheError> {
                if self.residency.write().set_held(descriptor.id, true) {
                    return Ok(None);
                }
                let data = self.loader.read_segment(descriptor)?;
                let segment = ResidentSegment::new(descriptor.clone(), data);
                let size = segment.size_bytes();
                self.residency.write().insert(segment, true);
                Ok(Some(size))
            });

            match loaded {
                Ok(Some(size)) => {
                    report.changed += 1;
                    report.bytes += size;
                    self.counters.forced_loads.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(segment = %descriptor.id, bytes = size, "segment force-loaded");
                }
                Ok(None) => report.unchanged += 1,
                Err(err) => {
                    tracing::warn!(
                        segment = %descriptor.id,
                        loaded = report.changed,
                        error = %err,
                        "forced load stopped"
                    );
                    return Err(err);
                }
            }
        }

        let usage = self.usage_bytes();
        if usage > self.capacity_bytes {
            tracing::info!(
                usage_bytes = usage,
                capacity_bytes = self.capacity_bytes,
                "forced load exceeded cache capacity"
            );
        }
        Ok(report)
    }

    /// Evict every listed segment.
    ///
    /// Holds and outstanding reader handles are ignored: readers keep their
    /// snapshot, new lookups miss. Releasing a segment that is not resident
    /// is a no-op.
    pub fn force_release(&self, ids: &[SegmentId]) -> Result<ForceReport, CacheError> {
        let mut report = ForceReport {
            requested: ids.len(),
            ..ForceReport::default()
        };

        for &id in ids {
            let removed = self.with_segment_lock(id, || self.residency.write().remove(id));
            match removed {
                Some(entry) => {
                    report.changed += 1;
                    report.bytes += entry.size_bytes();
                    self.counters.forced_releases.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        segment = %id,
                        readers = entry.reader_count(),
                        "segment force-released"
                    );
                }
                None => report.unchanged += 1,
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Ordinary path
    // ------------------------------------------------------------------

    /// Return a resident segment, loading it if it fits.
    ///
    /// On a miss the payload is read and admitted only if usage stays within
    /// capacity after evicting unheld, unreferenced segments; otherwise
    /// [`CacheError::CapacityExceeded`].
    pub fn get_or_load(&self, descriptor: &SegmentDescriptor) -> Result<SegmentHandle, CacheError> {
        if let Some(handle) = self.residency.read().touch(descriptor.id) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let data = self.with_segment_lock(descriptor.id, || {
            if let Some(handle) = self.residency.read().touch(descriptor.id) {
                return Ok(Err(handle));
            }
            self.loader.read_segment(descriptor).map(Ok)
        })?;
        let data = match data {
            Ok(data) => data,
            Err(handle) => return Ok(handle),
        };

        let required = data.len() as u64;
        let target = self.capacity_bytes.saturating_sub(required);
        if self.usage_bytes() > target {
            self.evict_to(target);
        }

        self.with_segment_lock(descriptor.id, || {
            let mut residency = self.residency.write();
            if let Some(handle) = residency.touch(descriptor.id) {
                return Ok(handle);
            }
            let available = self.capacity_bytes.saturating_sub(residency.usage_bytes());
            if required > available {
                return Err(CacheError::CapacityExceeded {
                    segment: descriptor.id,
                    required,
                    available,
                });
            }
            Ok(residency.insert(ResidentSegment::new(descriptor.clone(), data), false))
        })
    }

    /// Reader lookup without loading.
    pub fn lookup(&self, id: SegmentId) -> Option<SegmentHandle> {
        let handle = self.residency.read().touch(id);
        match handle {
            Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
            None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
        };
        handle
    }

    /// Background eviction pass: trim usage back to capacity.
    pub fn evict(&self) -> EvictionReport {
        self.evict_to(self.capacity_bytes)
    }

    /// Evict ordinary segments until usage is at most `target_bytes`.
    pub fn evict_to(&self, target_bytes: u64) -> EvictionReport {
        let mut report = EvictionReport::default();
        let (victims, usage) = {
            let residency = self.residency.read();
            let usage = residency.usage_bytes();
            if usage <= target_bytes {
                return report;
            }
            let candidates = eviction::candidates(&residency);
            report.skipped_held = candidates.iter().filter(|c| c.held).count();
            report.skipped_in_use = candidates
                .iter()
                .filter(|c| !c.held && c.readers > 0)
                .count();
            (eviction::select_victims(&candidates, usage - target_bytes), usage)
        };

        let mut remaining = usage;
        for id in victims {
            if remaining <= target_bytes {
                break;
            }
            let lease = SegmentLockLease::new(self, id);
            let evicted = match lease.lock().try_lock() {
                Some(_guard) => {
                    let mut residency = self.residency.write();
                    // Re-check under the lock: a forced load may have taken a
                    // hold or a reader a handle since selection.
                    let evictable = residency
                        .get(id)
                        .is_some_and(|entry| !entry.is_held() && entry.reader_count() == 0);
                    if evictable {
                        residency.remove(id)
                    } else {
                        None
                    }
                }
                None => {
                    report.skipped_locked += 1;
                    None
                }
            };
            drop(lease);

            if let Some(entry) = evicted {
                remaining = remaining.saturating_sub(entry.size_bytes());
                report.freed_bytes += entry.size_bytes();
                report.evicted.push(id);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        if !report.is_empty() {
            tracing::debug!(
                evicted = report.evicted.len(),
                freed_bytes = report.freed_bytes,
                skipped_held = report.skipped_held,
                skipped_locked = report.skipped_locked,
                "eviction pass"
            );
        }
        report
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn is_resident(&self, id: SegmentId) -> bool {
        self.residency.read().contains(id)
    }

    pub fn is_held(&self, id: SegmentId) -> bool {
        self.residency
            .read()
            .get(id)
            .is_some_and(|entry| entry.is_held())
    }

    /// Resident ids in ascending order.
    pub fn resident_ids(&self) -> Vec<SegmentId> {
        self.residency.read().ids()
    }

    /// The subset of `ids` resident at one instant.
    pub fn resident_subset(&self, ids: &[SegmentId]) -> HashSet<SegmentId> {
        let residency = self.residency.read();
        ids.iter().copied().filter(|id| residency.contains(*id)).collect()
    }

    pub fn usage_bytes(&self) -> u64 {
        self.residency.read().usage_bytes()
    }

    pub fn stats(&self) -> CacheStats {
        let residency = self.residency.read();
        CacheStats {
            resident_segments: residency.len(),
            held_segments: residency.held_count(),
            usage_bytes: residency.usage_bytes(),
            capacity_bytes: self.capacity_bytes,
            forced_loads: self.counters.forced_loads.load(Ordering::Relaxed),
            forced_releases: self.counters.forced_releases.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // Segment locks
    // ------------------------------------------------------------------

    fn segment_lock(&self, id: SegmentId) -> Arc<Mutex<()>> {
        let mut locks = self.segment_locks.lock();
        Arc::clone(locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    fn with_segment_lock<T>(&self, id: SegmentId, f: impl FnOnce() -> T) -> T {
        let lease = SegmentLockLease::new(self, id);
        let _guard = lease.lock().lock();
        f()
    }

    /// Drop a lock reference and forget the lock once nobody else holds it.
    fn prune_lock(&self, id: SegmentId, lock: Arc<Mutex<()>>) {
        let mut locks = self.segment_locks.lock();
        drop(lock);
        if locks.get(&id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn lock_table_len(&self) -> usize {
        self.segment_locks.lock().len()
    }
}

/// A reference to one segment's lock, pruned from the lock table on drop.
///
/// Pruning runs during unwinding too, so a panic under the lock does not
/// leave a stale entry behind.
struct SegmentLockLease<'a> {
    controller: &'a CacheController,
    id: SegmentId,
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a> SegmentLockLease<'a> {
    fn new(controller: &'a CacheController, id: SegmentId) -> Self {
        Self {
            controller,
            id,
            lock: Some(controller.segment_lock(id)),
        }
    }

    fn lock(&self) -> &Mutex<()> {
        match self.lock.as_ref() {
            Some(lock) => lock,
            None => unreachable!("segment lock lease used after release"),
        }
    }
}

impl Drop for SegmentLockLease<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            self.controller.prune_lock(self.id, lock);
        }
    }
}
