//! Cache controller integration tests.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera::cache::CacheController;
use tessera::catalog::{SegmentDescriptor, SegmentId};
use tessera::core::error::CacheError;
use tessera::storage::MemorySegmentStore;

fn descriptors(sizes: &[u64]) -> Vec<SegmentDescriptor> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, size)| SegmentDescriptor::new(SegmentId::new(i as u64 + 1), "c1", *size))
        .collect()
}

fn controller(capacity: u64) -> (Arc<MemorySegmentStore>, CacheController) {
    let store = Arc::new(MemorySegmentStore::synthetic());
    let cache = CacheController::new(store.clone(), capacity);
    (store, cache)
}

// ============================================================================
// Forced path
// ============================================================================

#[test]
fn force_load_then_release_round_trip() {
    let (_, cache) = controller(1_000);
    let segments = descriptors(&[100, 200, 300]);
    let ids: Vec<_> = segments.iter().map(|s| s.id).collect();

    let loaded = cache.force_load(&segments).unwrap();
    assert_eq!(loaded.changed, 3);
    assert_eq!(loaded.bytes, 600);
    assert!(ids.iter().all(|id| cache.is_held(*id)));

    let released = cache.force_release(&ids).unwrap();
    assert_eq!(released.changed, 3);
    assert_eq!(cache.usage_bytes(), 0);
    assert!(cache.resident_ids().is_empty());
}

#[test]
fn force_load_takes_hold_of_ordinary_segment() {
    let (store, cache) = controller(1_000);
    let segments = descriptors(&[100]);
    cache.get_or_load(&segments[0]).unwrap();
    assert!(!cache.is_held(segments[0].id));

    let report = cache.force_load(&segments).unwrap();
    assert_eq!(report.unchanged, 1);
    assert!(cache.is_held(segments[0].id));
    assert_eq!(store.read_count(), 1);
}

#[test]
fn readers_keep_their_snapshot_across_force_release() {
    let (_, cache) = controller(1_000);
    let segments = descriptors(&[128]);
    cache.force_load(&segments).unwrap();

    let handle = cache.lookup(segments[0].id).unwrap();
    cache.force_release(&[segments[0].id]).unwrap();

    assert!(cache.lookup(segments[0].id).is_none());
    assert_eq!(handle.data().len(), 128);
    assert_eq!(handle.id(), segments[0].id);
}

// ============================================================================
// Ordinary path
// ============================================================================

#[test]
fn ordinary_admission_evicts_least_recently_used() {
    let (_, cache) = controller(300);
    let segments = descriptors(&[100, 100, 100, 100]);

    for segment in &segments[..3] {
        cache.get_or_load(segment).unwrap();
    }
    // Touch the first so the second becomes the LRU victim.
    cache.lookup(segments[0].id).unwrap();

    cache.get_or_load(&segments[3]).unwrap();
    assert!(cache.is_resident(segments[0].id));
    assert!(!cache.is_resident(segments[1].id));
    assert!(cache.is_resident(segments[3].id));
    assert_eq!(cache.usage_bytes(), 300);
}

#[test]
fn ordinary_admission_refuses_when_held_segments_fill_the_cache() {
    let (_, cache) = controller(300);
    let segments = descriptors(&[200, 200]);
    cache.force_load(&segments[..1]).unwrap();

    let err = cache.get_or_load(&segments[1]).unwrap_err();
    match err {
        CacheError::CapacityExceeded {
            segment,
            required,
            available,
        } => {
            assert_eq!(segment, segments[1].id);
            assert_eq!(required, 200);
            assert_eq!(available, 100);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(cache.is_resident(segments[0].id));
}

#[test]
fn background_eviction_spares_held_and_referenced_segments() {
    let (_, cache) = controller(250);
    let segments = descriptors(&[100, 100, 100]);
    cache.get_or_load(&segments[0]).unwrap();
    let _reader = cache.get_or_load(&segments[1]);
    // Forced admission pushes usage past capacity.
    cache.force_load(&segments[2..]).unwrap();
    assert_eq!(cache.usage_bytes(), 300);

    let report = cache.evict();
    assert_eq!(report.evicted, vec![segments[0].id]);
    assert_eq!(report.skipped_held, 1);
    assert_eq!(report.skipped_in_use, 1);
    assert!(cache.is_resident(segments[1].id));
    assert!(cache.is_resident(segments[2].id));
}

#[test]
fn stats_track_forced_and_ordinary_activity() {
    let (_, cache) = controller(100);
    let segments = descriptors(&[60, 60]);
    cache.force_load(&segments[..1]).unwrap();
    cache.lookup(segments[0].id).unwrap();
    assert!(cache.lookup(segments[1].id).is_none());
    cache.force_release(&[segments[0].id]).unwrap();

    let stats = cache.stats();
    assert_eq!(stats.forced_loads, 1);
    assert_eq!(stats.forced_releases, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.resident_segments, 0);
    assert_eq!(stats.capacity_bytes, 100);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn forced_loads_win_against_background_eviction() {
    let (_, cache) = controller(64);
    let held = descriptors(&[32, 32, 32, 32]);
    let ordinary: Vec<_> = (10..20)
        .map(|i| SegmentDescriptor::new(SegmentId::new(i), "c2", 16))
        .collect();
    let stop = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                cache.evict();
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                for segment in &ordinary {
                    let _ = cache.get_or_load(segment);
                }
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                cache.force_load(&held).unwrap();
                assert!(held.iter().all(|s| cache.is_resident(s.id)));
            }
            stop.store(true, Ordering::Relaxed);
        });
    });

    assert!(held.iter().all(|s| cache.is_held(s.id)));
    cache.evict();
    assert!(held.iter().all(|s| cache.is_resident(s.id)));
}

#[test]
fn concurrent_readers_never_observe_partial_segments() {
    let (store, cache) = controller(1 << 20);
    let segments = descriptors(&[4096]);
    store.put(segments[0].id, vec![7u8; 4096]);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                cache.force_load(&segments).unwrap();
                cache.force_release(&[segments[0].id]).unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..2_000 {
                if let Some(handle) = cache.lookup(segments[0].id) {
                    assert_eq!(handle.data().len(), 4096);
                    assert!(handle.data().iter().all(|b| *b == 7));
                }
            }
        });
    });
    assert!(!cache.is_resident(segments[0].id));
}
