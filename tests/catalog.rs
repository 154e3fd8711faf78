//! Catalog and segment storage integration tests.

mod common;

use std::sync::Arc;
use tessera::cache::CacheController;
use tessera::catalog::manifest::{CatalogManifest, ManifestCollection, ManifestSegment};
use tessera::catalog::{Collection, MemoryCatalog, MetadataAccessor, SegmentId};
use tessera::commands::{CommandEnv, CommandExecutor, CommandKind, LifecycleRequest, RequestContext};
use tessera::core::error::{MetaError, StatusCode};
use tessera::storage::FileSegmentStore;

fn manifest() -> CatalogManifest {
    CatalogManifest {
        collections: vec![ManifestCollection {
            name: "orders".to_string(),
            partitions: vec!["2024".to_string(), "2025".to_string()],
        }],
        segments: Vec::new(),
    }
}

/// Write segment files and a manifest describing them.
fn write_layout(dir: &std::path::Path) -> (FileSegmentStore, CatalogManifest) {
    let store = FileSegmentStore::new(dir);
    store.initialize().unwrap();

    let mut manifest = manifest();
    for (id, partition, len) in [(1u64, None, 64usize), (2, Some("2024"), 128), (3, Some("2025"), 256)] {
        let payload: Vec<u8> = (0..len).map(|i| (i as u8) ^ (id as u8)).collect();
        let checksum = store.write_segment(SegmentId::new(id), &payload).unwrap();
        manifest.segments.push(ManifestSegment {
            id,
            collection: "orders".to_string(),
            partition: partition.map(str::to_string),
            size_bytes: len as u64,
            checksum: Some(checksum),
        });
    }
    manifest.write_to(&dir.join("catalog.toml")).unwrap();
    (store, manifest)
}

fn executor_for(catalog: MemoryCatalog, store: FileSegmentStore, capacity: u64) -> CommandExecutor {
    let cache = Arc::new(CacheController::new(Arc::new(store), capacity));
    CommandExecutor::new(CommandEnv::from_catalog(Arc::new(catalog), cache))
}

fn run(executor: &CommandExecutor, kind: CommandKind, collection: &str, tags: &[&str]) -> tessera::CommandOutcome {
    let tags = tags.iter().map(|t| t.to_string()).collect();
    let mut command = LifecycleRequest::new(kind, collection, tags).into_command(RequestContext::new());
    executor.execute(command.as_mut())
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn partitions_are_registered_as_owned_sub_collections() {
    let catalog = manifest().into_catalog().unwrap();
    let schema = catalog.describe_collection("orders_2024").unwrap();
    assert_eq!(schema.owner(), Some("orders"));
    match schema.classify() {
        Collection::Partition(partition) => {
            assert_eq!(partition.owner, "orders");
            assert_eq!(partition.tag, "2024");
        }
        other => panic!("expected a partition, got {other:?}"),
    }
    assert!(matches!(
        catalog.describe_collection("orders").unwrap().classify(),
        Collection::Root(_)
    ));
}

#[test]
fn not_found_is_distinct_from_outage() {
    let catalog = MemoryCatalog::new();
    assert!(catalog.describe_collection("nope").unwrap_err().is_not_found());
    assert!(!catalog.has_collection("nope").unwrap());

    catalog.set_outage("down");
    let err = catalog.describe_collection("nope").unwrap_err();
    assert!(matches!(err, MetaError::Unavailable { .. }));
    assert!(catalog.has_collection("nope").is_err());
}

#[test]
fn manifest_with_unknown_partition_segment_is_rejected() {
    let mut manifest = manifest();
    manifest.segments.push(ManifestSegment {
        id: 1,
        collection: "orders".to_string(),
        partition: Some("1999".to_string()),
        size_bytes: 1,
        checksum: None,
    });
    assert!(manifest.into_catalog().is_err());
}

#[test]
fn manifest_file_round_trip() {
    let dir = common::temp_storage_dir();
    let (_, written) = write_layout(dir.path());
    let read = CatalogManifest::from_file(&dir.path().join("catalog.toml")).unwrap();
    assert_eq!(read, written);
}

// ============================================================================
// End to end over segment files
// ============================================================================

#[test]
fn lifecycle_over_segment_files() {
    let dir = common::temp_storage_dir();
    let (store, manifest) = write_layout(dir.path());
    let executor = executor_for(manifest.into_catalog().unwrap(), store, 1 << 20);

    let outcome = run(&executor, CommandKind::LoadCollection, "orders", &["2024"]);
    assert!(outcome.is_ok(), "{}", outcome.status);
    let cache = executor.env().cache();
    assert!(cache.is_resident(SegmentId::new(2)));
    assert!(!cache.is_resident(SegmentId::new(3)));
    assert_eq!(cache.usage_bytes(), 128);

    assert!(run(&executor, CommandKind::LoadCollection, "orders", &[]).is_ok());
    assert_eq!(cache.usage_bytes(), 64 + 128 + 256);

    assert!(run(&executor, CommandKind::ReleaseCollection, "orders", &[]).is_ok());
    assert!(cache.resident_ids().is_empty());

    let outcome = run(&executor, CommandKind::ReleaseCollection, "orders_2025", &[]);
    assert_eq!(outcome.status.code, StatusCode::InvalidCollectionReference);
}

#[test]
fn tampered_segment_file_is_a_cache_fault() {
    let dir = common::temp_storage_dir();
    let (store, manifest) = write_layout(dir.path());
    std::fs::write(store.segment_path(SegmentId::new(3)), vec![0u8; 256]).unwrap();
    let executor = executor_for(manifest.into_catalog().unwrap(), store, 1 << 20);

    let outcome = run(&executor, CommandKind::LoadCollection, "orders", &["2025"]);
    assert_eq!(outcome.status.code, StatusCode::CacheCorrupt);
    assert!(outcome.status.message.contains("checksum"));
}

#[test]
fn deleted_segment_file_is_reported_missing() {
    let dir = common::temp_storage_dir();
    let (store, manifest) = write_layout(dir.path());
    std::fs::remove_file(store.segment_path(SegmentId::new(1))).unwrap();
    let executor = executor_for(manifest.into_catalog().unwrap(), store, 1 << 20);

    let outcome = run(&executor, CommandKind::LoadCollection, "orders", &["_default"]);
    assert_eq!(outcome.status.code, StatusCode::SegmentMissing);
}
