//! Core infrastructure tests: configuration, errors, runtime.

mod common;

use std::sync::Arc;
use tessera::catalog::SegmentId;
use tessera::commands::{CommandKind, LifecycleRequest, RequestContext};
use tessera::core::config::Config;
use tessera::core::error::{CacheError, ErrorClass, MetaError, Status, StatusCode, TesseraError};
use tessera::core::runtime::{ComponentHealth, Runtime};
use tessera::storage::MemorySegmentStore;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_full_config() {
    let file = common::config_file(
        r#"
[cache]
capacity_bytes = 1048576
eviction_interval_ms = 250
eviction_enabled = true

[paths]
storage_dir = "/var/lib/tessera"
catalog_manifest = "catalog.toml"

[telemetry]
log_level = "debug"
audit_capacity = 64

[preload]
fail_on_error = true

[[preload.collections]]
name = "c1"
partition_tags = ["p1", "p2"]

[[preload.collections]]
name = "c2"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.cache.capacity_bytes, 1_048_576);
    assert_eq!(config.cache.eviction_interval_ms, 250);
    assert_eq!(config.telemetry.audit_capacity, 64);
    assert!(config.preload.fail_on_error);
    assert_eq!(config.preload.collections.len(), 2);
    assert_eq!(config.preload.collections[0].partition_tags, vec!["p1", "p2"]);
    assert!(config.preload.collections[1].partition_tags.is_empty());
    assert_eq!(
        config.paths.catalog_manifest_path(),
        std::path::Path::new("/var/lib/tessera/catalog.toml")
    );
}

#[test]
fn validate_zero_interval_with_eviction_enabled() {
    let file = common::config_file("[cache]\neviction_interval_ms = 0\n");
    let result = Config::from_file(file.path());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("eviction_interval_ms"));

    let file = common::config_file("[cache]\neviction_interval_ms = 0\neviction_enabled = false\n");
    assert!(Config::from_file(file.path()).is_ok());
}

#[test]
fn validate_preload_tags() {
    let file = common::config_file(
        r#"
[[preload.collections]]
name = "c1"
partition_tags = ["ok", "not ok"]
"#,
    );
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn mistyped_field_is_a_parse_error() {
    let file = common::config_file("[cache]\ncapacity_bytes = \"lots\"\n");
    assert!(Config::from_file(file.path()).is_err());
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn meta_not_found_maps_to_collection_not_found() {
    let err: TesseraError = MetaError::not_found("c9").into();
    assert_eq!(err.class(), ErrorClass::CollectionNotFound);
    assert_eq!(err.status_code(), StatusCode::CollectionNotFound);
}

#[test]
fn underlying_failures_keep_their_detail() {
    let err: TesseraError = MetaError::unavailable("store timeout").into();
    assert_eq!(err.class(), ErrorClass::UnderlyingFailure);
    assert!(err.is_retriable());
    assert!(err.to_string().contains("store timeout"));

    let err: TesseraError = CacheError::Missing {
        segment: SegmentId::new(7),
    }
    .into();
    assert_eq!(err.class(), ErrorClass::UnderlyingFailure);
    assert!(!err.is_retriable());
    assert_eq!(err.status_code(), StatusCode::SegmentMissing);
}

#[test]
fn status_codes_are_stable() {
    assert_eq!(StatusCode::Ok.as_u16(), 0);
    assert_eq!(StatusCode::InvalidArgument.as_u16(), 1);
    assert_eq!(StatusCode::CollectionNotFound.as_u16(), 2);
    assert_eq!(StatusCode::InvalidCollectionReference.as_u16(), 3);
    assert_eq!(StatusCode::UnexpectedError.as_u16(), 99);

    let status = Status::from_error(&TesseraError::unexpected("boom"));
    assert_eq!(status.code, StatusCode::UnexpectedError);
    assert!(status.message.contains("boom"));
    assert!(Status::ok().is_ok());
}

// ============================================================================
// Runtime tests
// ============================================================================

fn runtime_config(storage_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.paths.storage_dir = storage_dir.to_string_lossy().into_owned();
    config.cache.capacity_bytes = 1_000;
    config.cache.eviction_interval_ms = 10;
    config
}

#[tokio::test]
async fn runtime_starts_with_empty_catalog_when_manifest_is_absent() {
    let dir = common::temp_storage_dir();
    let mut runtime = Runtime::new(runtime_config(dir.path())).unwrap();
    runtime.start().await.unwrap();

    assert!(runtime.is_running());
    assert!(runtime.is_ready());
    assert_eq!(runtime.health().catalog, ComponentHealth::Degraded);
    assert!(dir.path().join("segments").is_dir());
    assert!(runtime.health_status().healthy);

    let outcome = runtime
        .dispatch(LifecycleRequest::new(CommandKind::LoadCollection, "c1", vec![]))
        .await
        .unwrap();
    assert_eq!(outcome.status.code, StatusCode::CollectionNotFound);

    runtime.stop().await.unwrap();
    assert!(!runtime.is_running());
    assert!(!runtime.health_status().healthy);
    assert_eq!(runtime.health().eviction, ComponentHealth::Stopped);
}

#[tokio::test]
async fn runtime_preloads_and_dispatches() {
    let dir = common::temp_storage_dir();
    let mut config = runtime_config(dir.path());
    config.preload.collections.push(tessera::config::PreloadCollection {
        name: "c1".to_string(),
        partition_tags: vec!["p1".to_string()],
    });

    let mut runtime = Runtime::new(config)
        .unwrap()
        .with_catalog(common::standard_catalog())
        .with_loader(Arc::new(MemorySegmentStore::synthetic()));
    runtime.start().await.unwrap();

    let cache = runtime.cache().unwrap().clone();
    let catalog = runtime.catalog().unwrap().clone();
    let p1 = common::segment_ids(&catalog, "c1", &["p1"]);
    assert!(p1.iter().all(|id| cache.is_held(*id)));
    assert!(runtime.audit().by_request("preload-0").is_some());

    let outcome = runtime
        .dispatch_with(
            LifecycleRequest::new(CommandKind::ReleaseCollection, "c1", vec![]),
            RequestContext::with_request_id("rt-release").with_client("test"),
        )
        .await
        .unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.request_id, "rt-release");
    assert!(cache.resident_ids().is_empty());

    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn failed_preload_aborts_start_when_configured() {
    let dir = common::temp_storage_dir();
    let mut config = runtime_config(dir.path());
    config.preload.fail_on_error = true;
    config.preload.collections.push(tessera::config::PreloadCollection {
        name: "missing".to_string(),
        partition_tags: vec![],
    });

    let mut runtime = Runtime::new(config.clone())
        .unwrap()
        .with_catalog(common::standard_catalog())
        .with_loader(Arc::new(MemorySegmentStore::synthetic()));
    let err = runtime.start().await.unwrap_err();
    assert!(err.to_string().contains("missing"));

    config.preload.fail_on_error = false;
    let mut runtime = Runtime::new(config)
        .unwrap()
        .with_catalog(common::standard_catalog())
        .with_loader(Arc::new(MemorySegmentStore::synthetic()));
    runtime.start().await.unwrap();
    runtime.stop().await.unwrap();
}

#[tokio::test]
async fn background_eviction_trims_ordinary_segments() {
    let dir = common::temp_storage_dir();
    let mut config = runtime_config(dir.path());
    config.cache.capacity_bytes = 150;

    let mut runtime = Runtime::new(config)
        .unwrap()
        .with_catalog(common::standard_catalog())
        .with_loader(Arc::new(MemorySegmentStore::synthetic()));
    runtime.start().await.unwrap();

    let cache = runtime.cache().unwrap().clone();
    let catalog = runtime.catalog().unwrap().clone();
    let ordinary = common::segment_ids(&catalog, "c1", &["_default"])[0];
    cache
        .get_or_load(&catalog.segment(ordinary).unwrap())
        .unwrap();

    // Held segments push usage over capacity.
    assert!(runtime
        .dispatch(LifecycleRequest::new(CommandKind::LoadCollection, "c1", vec!["p1".into()]))
        .await
        .unwrap()
        .is_ok());

    let mut trimmed = false;
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if !cache.is_resident(ordinary) {
            trimmed = true;
            break;
        }
    }
    assert!(trimmed, "ordinary segment was never evicted");
    assert!(common::segment_ids(&catalog, "c1", &["p1"])
        .iter()
        .all(|id| cache.is_held(*id)));
    assert_eq!(cache.usage_bytes(), 400);

    runtime.stop().await.unwrap();
}
