//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tessera::cache::CacheController;
use tessera::catalog::{MemoryCatalog, MetadataAccessor, PartitionTagSet, SegmentEnumerator, SegmentId};
use tessera::commands::{CommandEnv, CommandExecutor, CommandKind, CommandOutcome, LifecycleRequest, RequestContext};
use tessera::ops::FailPoints;
use tessera::storage::MemorySegmentStore;

/// Segment sizes of the standard catalog.
pub const C1_DEFAULT_SIZES: [u64; 2] = [100, 100];
pub const C1_P1_SIZES: [u64; 2] = [200, 200];
pub const C1_P2_SIZES: [u64; 1] = [300];
pub const C2_SIZES: [u64; 1] = [50];

/// Total payload bytes of `c1`.
pub const C1_TOTAL_BYTES: u64 = 100 + 100 + 200 + 200 + 300;

/// Build the standard catalog:
///
/// - root `c1` with partitions `p1`, `p2` (sub-collections `c1_p1`, `c1_p2`)
///   and segments in `_default`, `p1` and `p2`
/// - root `c2` with one default-partition segment
/// - root `empty` with no segments
pub fn standard_catalog() -> Arc<MemoryCatalog> {
    let catalog = MemoryCatalog::new();
    catalog.create_collection("c1").unwrap();
    catalog.create_partition("c1", "p1").unwrap();
    catalog.create_partition("c1", "p2").unwrap();
    catalog.create_collection("c2").unwrap();
    catalog.create_collection("empty").unwrap();

    for size in C1_DEFAULT_SIZES {
        catalog.add_segment("c1", None, size, None).unwrap();
    }
    for size in C1_P1_SIZES {
        catalog.add_segment("c1", Some("p1"), size, None).unwrap();
    }
    for size in C1_P2_SIZES {
        catalog.add_segment("c1", Some("p2"), size, None).unwrap();
    }
    for size in C2_SIZES {
        catalog.add_segment("c2", None, size, None).unwrap();
    }
    Arc::new(catalog)
}

/// A wired command environment over the standard catalog.
pub struct Fixture {
    pub catalog: Arc<MemoryCatalog>,
    pub store: Arc<MemorySegmentStore>,
    pub cache: Arc<CacheController>,
    pub failpoints: Arc<FailPoints>,
    pub executor: CommandExecutor,
}

impl Fixture {
    /// Fixture whose cache can hold every segment of the catalog.
    pub fn new() -> Self {
        Self::with_capacity(1 << 20)
    }

    /// Fixture with an explicit cache capacity.
    pub fn with_capacity(capacity_bytes: u64) -> Self {
        let catalog = standard_catalog();
        let store = Arc::new(MemorySegmentStore::synthetic());
        let cache = Arc::new(CacheController::new(store.clone(), capacity_bytes));
        let failpoints = Arc::new(FailPoints::new());
        let env = CommandEnv::from_catalog(catalog.clone(), cache.clone())
            .with_failpoints(failpoints.clone());
        Self {
            catalog,
            store,
            cache,
            failpoints,
            executor: CommandExecutor::new(env),
        }
    }

    /// Run one request to completion.
    pub fn run(&self, kind: CommandKind, collection: &str, tags: &[&str]) -> CommandOutcome {
        let tags = tags.iter().map(|t| t.to_string()).collect();
        let mut command = LifecycleRequest::new(kind, collection, tags).into_command(RequestContext::new());
        self.executor.execute(command.as_mut())
    }

    pub fn load(&self, collection: &str, tags: &[&str]) -> CommandOutcome {
        self.run(CommandKind::LoadCollection, collection, tags)
    }

    pub fn release(&self, collection: &str, tags: &[&str]) -> CommandOutcome {
        self.run(CommandKind::ReleaseCollection, collection, tags)
    }

    pub fn describe(&self, collection: &str, tags: &[&str]) -> CommandOutcome {
        self.run(CommandKind::DescribeResidency, collection, tags)
    }

    /// Segment ids of a root collection within a tag scope.
    pub fn segment_ids(&self, collection: &str, tags: &[&str]) -> Vec<SegmentId> {
        segment_ids(&self.catalog, collection, tags)
    }

    /// Whether every listed segment is resident.
    pub fn all_resident(&self, ids: &[SegmentId]) -> bool {
        ids.iter().all(|id| self.cache.is_resident(*id))
    }

    /// Whether none of the listed segments is resident.
    pub fn none_resident(&self, ids: &[SegmentId]) -> bool {
        ids.iter().all(|id| !self.cache.is_resident(*id))
    }
}

/// Segment ids of a root collection within a tag scope, in catalog order.
pub fn segment_ids(catalog: &MemoryCatalog, collection: &str, tags: &[&str]) -> Vec<SegmentId> {
    let root = catalog
        .describe_collection(collection)
        .unwrap()
        .classify()
        .into_lifecycle_target()
        .unwrap();
    let tags = PartitionTagSet::new(tags.iter().map(|t| t.to_string()));
    catalog
        .segments(&root, &tags)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect()
}

/// Write a config file.
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Create a temporary storage directory.
pub fn temp_storage_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}
