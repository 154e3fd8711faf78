//! Ordinary (capacity-respecting) eviction policy.
//!
//! Victims are chosen least-recently-used first among segments that are not
//! held by a forced load and have no outstanding reader handles. Selection
//! is pure; the controller applies it under its locks and re-checks each
//! victim before removing it.

use crate::cache::residency::ResidencySet;
use crate::catalog::segments::SegmentId;
use serde::Serialize;

/// Eviction-relevant view of one resident segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub id: SegmentId,
    pub size_bytes: u64,
    pub last_access: u64,
    pub held: bool,
    pub readers: usize,
}

impl EvictionCandidate {
    /// Whether ordinary eviction may take this segment at all.
    pub fn is_evictable(&self) -> bool {
        !self.held && self.readers == 0
    }
}

/// Snapshot candidates from a residency set.
pub fn candidates(set: &ResidencySet) -> Vec<EvictionCandidate> {
    set.iter()
        .map(|(id, entry)| EvictionCandidate {
            id: *id,
            size_bytes: entry.size_bytes(),
            last_access: entry.last_access(),
            held: entry.is_held(),
            readers: entry.reader_count(),
        })
        .collect()
}

/// Pick victims, oldest access first, until at least `bytes_to_free` bytes
/// would be released or no evictable segment remains.
pub fn select_victims(candidates: &[EvictionCandidate], bytes_to_free: u64) -> Vec<SegmentId> {
    if bytes_to_free == 0 {
        return Vec::new();
    }
    let mut evictable: Vec<&EvictionCandidate> =
        candidates.iter().filter(|c| c.is_evictable()).collect();
    evictable.sort_by_key(|c| (c.last_access, c.id));

    let mut freed = 0u64;
    let mut victims = Vec::new();
    for candidate in evictable {
        if freed >= bytes_to_free {
            break;
        }
        freed += candidate.size_bytes;
        victims.push(candidate.id);
    }
    victims
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Segments removed, in eviction order.
    pub evicted: Vec<SegmentId>,
    pub freed_bytes: u64,
    /// Candidates skipped because a forced load holds them.
    pub skipped_held: usize,
    /// Candidates skipped because readers still reference them.
    pub skipped_in_use: usize,
    /// Candidates skipped because a forced operation had their lock.
    pub skipped_locked: usize,
}

impl EvictionReport {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}
