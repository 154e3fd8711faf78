//! On-disk catalog description.
//!
//! A manifest is a TOML file listing root collections, their partitions and
//! the segments stored for them:
//!
//! ```toml
//! [[collections]]
//! name = "c1"
//! partitions = ["p1", "p2"]
//!
//! [[segments]]
//! id = 1
//! collection = "c1"
//! partition = "p1"
//! size_bytes = 4096
//! checksum = 1234567890
//! ```
//!
//! The manifest is read once at startup and materialized into a
//! [`MemoryCatalog`]; nothing writes it back except `tessera init`.

use crate::catalog::memory::MemoryCatalog;
use crate::catalog::schema::DEFAULT_PARTITION_TAG;
use crate::catalog::segments::{SegmentDescriptor, SegmentId};
use crate::catalog::validation::{validate_collection_name, validate_partition_tag};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed catalog manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub collections: Vec<ManifestCollection>,

    #[serde(default)]
    pub segments: Vec<ManifestSegment>,
}

/// One root collection and its partition tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCollection {
    pub name: String,
    #[serde(default)]
    pub partitions: Vec<String>,
}

/// One segment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSegment {
    pub id: u64,
    pub collection: String,
    /// Partition tag; omitted for the default partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u64>,
}

impl CatalogManifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog manifest: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid catalog manifest: {}", path.display()))
    }

    /// Parse a manifest from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: CatalogManifest =
            toml::from_str(content).with_context(|| "failed to parse catalog manifest")?;
        Ok(manifest)
    }

    /// Render the manifest as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialize catalog manifest")
    }

    /// Write the manifest to a file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write catalog manifest: {}", path.display()))
    }

    /// Build an in-memory catalog from this manifest.
    ///
    /// Names and tags go through the same syntax checks as request
    /// arguments, so every entry the catalog serves is addressable.
    pub fn into_catalog(self) -> Result<MemoryCatalog> {
        let catalog = MemoryCatalog::new();

        for collection in &self.collections {
            validate_collection_name(&collection.name)
                .with_context(|| format!("collection {:?}", collection.name))?;
            catalog.create_collection(&collection.name)?;
            for tag in &collection.partitions {
                let tag = validate_partition_tag(tag)
                    .with_context(|| format!("collection {}", collection.name))?;
                catalog.create_partition(&collection.name, &tag)?;
            }
        }

        for segment in self.segments {
            let tag = segment
                .partition
                .unwrap_or_else(|| DEFAULT_PARTITION_TAG.to_string());
            let mut descriptor =
                SegmentDescriptor::new(SegmentId::new(segment.id), segment.collection, segment.size_bytes)
                    .with_partition(tag);
            descriptor.checksum = segment.checksum;
            catalog.insert_segment(descriptor)?;
        }

        tracing::debug!(
            collections = self.collections.len(),
            segments = catalog.segment_count(),
            "catalog manifest loaded"
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::accessor::MetadataAccessor;

    const MANIFEST: &str = r#"
[[collections]]
name = "c1"
partitions = ["p1"]

[[segments]]
id = 4
collection = "c1"
size_bytes = 100

[[segments]]
id = 9
collection = "c1"
partition = "p1"
size_bytes = 200
checksum = 77
"#;

    #[test]
    fn manifest_materializes_catalog() {
        let catalog = CatalogManifest::from_toml(MANIFEST)
            .unwrap()
            .into_catalog()
            .unwrap();
        assert_eq!(catalog.partition_tags("c1").unwrap(), vec!["p1"]);
        let seg = catalog.segment(SegmentId::new(9)).unwrap();
        assert_eq!(seg.partition_tag, "p1");
        assert_eq!(seg.checksum, Some(77));
        assert_eq!(
            catalog.segment(SegmentId::new(4)).unwrap().partition_tag,
            DEFAULT_PARTITION_TAG
        );
    }

    #[test]
    fn duplicate_segment_ids_are_rejected() {
        let text = format!(
            "{MANIFEST}\n[[segments]]\nid = 4\ncollection = \"c1\"\nsize_bytes = 1\n"
        );
        let err = CatalogManifest::from_toml(&text)
            .unwrap()
            .into_catalog()
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn invalid_collection_name_is_rejected() {
        let text = "[[collections]]\nname = \"bad name\"\n";
        assert!(CatalogManifest::from_toml(text)
            .unwrap()
            .into_catalog()
            .is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let manifest = CatalogManifest::from_toml(MANIFEST).unwrap();
        let again = CatalogManifest::from_toml(&manifest.to_toml().unwrap()).unwrap();
        assert_eq!(manifest, again);
    }
}
