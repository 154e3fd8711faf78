//! Init command implementation.

use crate::catalog::manifest::{CatalogManifest, ManifestCollection, ManifestSegment};
use crate::catalog::segments::SegmentId;
use crate::core::config::Config;
use crate::storage::segment_store::FileSegmentStore;
use anyhow::Result;
use clap::Args;

/// Initialize the storage layout.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Write a demo catalog manifest and matching segment files.
    #[arg(long)]
    pub demo: bool,

    /// Overwrite an existing catalog manifest.
    #[arg(long)]
    pub force: bool,
}

/// Run the init command.
pub fn run_init(args: InitArgs, config: &Config) -> Result<()> {
    let store = FileSegmentStore::new(&config.paths.storage_dir);
    store.initialize()?;
    println!("Initialized storage directory: {}", store.storage_dir().display());

    if args.demo {
        let manifest_path = config.paths.catalog_manifest_path();
        if manifest_path.exists() && !args.force {
            anyhow::bail!(
                "catalog manifest {} already exists (use --force to overwrite)",
                manifest_path.display()
            );
        }
        let manifest = write_demo(&store)?;
        manifest.write_to(&manifest_path)?;
        println!(
            "Wrote demo catalog with {} segments: {}",
            manifest.segments.len(),
            manifest_path.display()
        );
    }

    Ok(())
}

/// Demo layout: (segment id, partition, size in bytes).
const DEMO_SEGMENTS: &[(u64, Option<&str>, u64)] = &[
    (1, None, 4096),
    (2, Some("p1"), 8192),
    (3, Some("p1"), 8192),
    (4, Some("p2"), 16384),
];

fn write_demo(store: &FileSegmentStore) -> Result<CatalogManifest> {
    let mut manifest = CatalogManifest {
        collections: vec![ManifestCollection {
            name: "demo".to_string(),
            partitions: vec!["p1".to_string(), "p2".to_string()],
        }],
        segments: Vec::with_capacity(DEMO_SEGMENTS.len()),
    };

    for &(id, partition, size_bytes) in DEMO_SEGMENTS {
        let payload = demo_payload(id, size_bytes);
        let checksum = store.write_segment(SegmentId::new(id), &payload)?;
        manifest.segments.push(ManifestSegment {
            id,
            collection: "demo".to_string(),
            partition: partition.map(str::to_string),
            size_bytes,
            checksum: Some(checksum),
        });
    }
    Ok(manifest)
}

fn demo_payload(id: u64, size_bytes: u64) -> Vec<u8> {
    (0..size_bytes)
        .map(|i| (i.wrapping_mul(31).wrapping_add(id) & 0xff) as u8)
        .collect()
}
