//! Segment identity and enumeration.
//!
//! A segment is the unit of cache residency. The [`SegmentEnumerator`]
//! resolves a root collection plus a partition-tag scope to the concrete
//! segments a lifecycle command acts on.

use crate::catalog::schema::{PartitionTagSet, RootCollection, DEFAULT_PARTITION_TAG};
use crate::core::error::MetaError;
use serde::{Deserialize, Serialize};

/// Segment identifier, unique across the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(u64);

impl SegmentId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog record for one physical segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Segment identifier.
    pub id: SegmentId,

    /// Owning root collection.
    pub collection: String,

    /// Partition tag; [`DEFAULT_PARTITION_TAG`] for untagged data.
    pub partition_tag: String,

    /// Size of the segment payload in bytes.
    pub size_bytes: u64,

    /// XxHash64 of the payload, when the catalog records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u64>,
}

impl SegmentDescriptor {
    /// Create a descriptor in the default partition.
    pub fn new(id: SegmentId, collection: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            id,
            collection: collection.into(),
            partition_tag: DEFAULT_PARTITION_TAG.to_string(),
            size_bytes,
            checksum: None,
        }
    }

    /// Place the segment in a tagged partition.
    pub fn with_partition(mut self, tag: impl Into<String>) -> Self {
        self.partition_tag = tag.into();
        self
    }

    /// Record the payload checksum.
    pub fn with_checksum(mut self, checksum: u64) -> Self {
        self.checksum = Some(checksum);
        self
    }
}

/// Resolves (collection, tag scope) pairs to segments.
///
/// Implementations return segments ordered by id. An empty tag set
/// addresses every partition, including the default one.
pub trait SegmentEnumerator: Send + Sync {
    /// List the segments of `collection` within `tags`.
    fn segments(
        &self,
        collection: &RootCollection,
        tags: &PartitionTagSet,
    ) -> Result<Vec<SegmentDescriptor>, MetaError>;
}
