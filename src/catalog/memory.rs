//! In-process metadata store.
//!
//! [`MemoryCatalog`] holds collection schemas and segment records behind a
//! single lock and implements both [`MetadataAccessor`] and
//! [`SegmentEnumerator`]. Partition sub-collections are stored as ordinary
//! schemas named `{owner}_{tag}` with `owner_collection` set.

use crate::catalog::accessor::MetadataAccessor;
use crate::catalog::schema::{CollectionSchema, PartitionTagSet, RootCollection, DEFAULT_PARTITION_TAG};
use crate::catalog::segments::{SegmentDescriptor, SegmentEnumerator, SegmentId};
use crate::core::error::MetaError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct CatalogState {
    collections: HashMap<String, CollectionSchema>,
    /// Partition tags per root collection, in creation order.
    partitions: HashMap<String, Vec<String>>,
    segments: BTreeMap<SegmentId, SegmentDescriptor>,
}

/// In-memory metadata store and segment catalog.
#[derive(Debug)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    next_segment_id: AtomicU64,
    /// When set, every query fails with `Unavailable` carrying this message.
    outage: RwLock<Option<String>>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            next_segment_id: AtomicU64::new(1),
            outage: RwLock::new(None),
        }
    }

    /// Name used for the partition sub-collection of `owner` tagged `tag`.
    pub fn partition_collection_name(owner: &str, tag: &str) -> String {
        format!("{owner}_{tag}")
    }

    /// Register a root collection.
    pub fn create_collection(&self, name: &str) -> Result<CollectionSchema, MetaError> {
        self.check_available()?;
        let mut state = self.state.write();
        if state.collections.contains_key(name) {
            return Err(MetaError::AlreadyExists {
                entity: format!("collection {name}"),
            });
        }
        let schema = CollectionSchema::root(name);
        state.collections.insert(name.to_string(), schema.clone());
        state.partitions.insert(name.to_string(), Vec::new());
        tracing::debug!(collection = %name, "collection created");
        Ok(schema)
    }

    /// Register a partition of a root collection.
    ///
    /// Returns the partition sub-collection's schema.
    pub fn create_partition(&self, owner: &str, tag: &str) -> Result<CollectionSchema, MetaError> {
        self.check_available()?;
        let mut state = self.state.write();
        match state.collections.get(owner) {
            None => return Err(MetaError::not_found(owner)),
            Some(schema) if schema.is_partition() => {
                return Err(MetaError::Corrupt {
                    message: format!("cannot partition {owner}: it is itself a partition"),
                })
            }
            Some(_) => {}
        }
        if tag == DEFAULT_PARTITION_TAG {
            return Err(MetaError::AlreadyExists {
                entity: format!("partition {owner}/{tag}"),
            });
        }

        let name = Self::partition_collection_name(owner, tag);
        if state.collections.contains_key(&name) {
            return Err(MetaError::AlreadyExists {
                entity: format!("collection {name}"),
            });
        }
        let schema = CollectionSchema::partition(name.clone(), owner, tag);
        state.collections.insert(name, schema.clone());
        state
            .partitions
            .entry(owner.to_string())
            .or_default()
            .push(tag.to_string());
        Ok(schema)
    }

    /// Add a segment with a freshly allocated id.
    ///
    /// `partition_tag` of `None` places the segment in the default partition.
    pub fn add_segment(
        &self,
        collection: &str,
        partition_tag: Option<&str>,
        size_bytes: u64,
        checksum: Option<u64>,
    ) -> Result<SegmentDescriptor, MetaError> {
        let id = SegmentId::new(self.next_segment_id.fetch_add(1, Ordering::Relaxed));
        let mut descriptor = SegmentDescriptor::new(id, collection, size_bytes)
            .with_partition(partition_tag.unwrap_or(DEFAULT_PARTITION_TAG));
        descriptor.checksum = checksum;
        self.insert_segment(descriptor.clone())?;
        Ok(descriptor)
    }

    /// Insert a segment record with a caller-chosen id.
    pub fn insert_segment(&self, descriptor: SegmentDescriptor) -> Result<(), MetaError> {
        self.check_available()?;
        let mut state = self.state.write();
        match state.collections.get(&descriptor.collection) {
            None => return Err(MetaError::not_found(&descriptor.collection)),
            Some(schema) if schema.is_partition() => {
                return Err(MetaError::Corrupt {
                    message: format!(
                        "segment {} must belong to a root collection, not {}",
                        descriptor.id, descriptor.collection
                    ),
                })
            }
            Some(_) => {}
        }
        let known_tag = descriptor.partition_tag == DEFAULT_PARTITION_TAG
            || state
                .partitions
                .get(&descriptor.collection)
                .is_some_and(|tags| tags.contains(&descriptor.partition_tag));
        if !known_tag {
            return Err(MetaError::Corrupt {
                message: format!(
                    "segment {} names unknown partition {}/{}",
                    descriptor.id, descriptor.collection, descriptor.partition_tag
                ),
            });
        }
        if state.segments.contains_key(&descriptor.id) {
            return Err(MetaError::AlreadyExists {
                entity: format!("segment {}", descriptor.id),
            });
        }

        self.next_segment_id
            .fetch_max(descriptor.id.get() + 1, Ordering::Relaxed);
        state.segments.insert(descriptor.id, descriptor);
        Ok(())
    }

    /// Look up a segment record.
    pub fn segment(&self, id: SegmentId) -> Option<SegmentDescriptor> {
        self.state.read().segments.get(&id).cloned()
    }

    /// Names of all root collections, sorted.
    pub fn root_collections(&self) -> Vec<String> {
        let state = self.state.read();
        let mut names: Vec<String> = state
            .collections
            .values()
            .filter(|schema| !schema.is_partition())
            .map(|schema| schema.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of segment records.
    pub fn segment_count(&self) -> usize {
        self.state.read().segments.len()
    }

    /// Simulate a metadata store outage until [`MemoryCatalog::restore`].
    pub fn set_outage(&self, message: impl Into<String>) {
        *self.outage.write() = Some(message.into());
    }

    /// End a simulated outage.
    pub fn restore(&self) {
        *self.outage.write() = None;
    }

    fn check_available(&self) -> Result<(), MetaError> {
        match self.outage.read().as_ref() {
            Some(message) => Err(MetaError::unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

impl MetadataAccessor for MemoryCatalog {
    fn describe_collection(&self, name: &str) -> Result<CollectionSchema, MetaError> {
        self.check_available()?;
        self.state
            .read()
            .collections
            .get(name)
            .cloned()
            .ok_or_else(|| MetaError::not_found(name))
    }

    fn partition_tags(&self, collection: &str) -> Result<Vec<String>, MetaError> {
        self.check_available()?;
        self.state
            .read()
            .partitions
            .get(collection)
            .cloned()
            .ok_or_else(|| MetaError::not_found(collection))
    }
}

impl SegmentEnumerator for MemoryCatalog {
    fn segments(
        &self,
        collection: &RootCollection,
        tags: &PartitionTagSet,
    ) -> Result<Vec<SegmentDescriptor>, MetaError> {
        self.check_available()?;
        let state = self.state.read();
        let known = state
            .partitions
            .get(collection.name())
            .ok_or_else(|| MetaError::not_found(collection.name()))?;

        if !tags.is_whole_collection() {
            for tag in tags.iter() {
                if tag != DEFAULT_PARTITION_TAG && !known.iter().any(|k| k == tag) {
                    tracing::warn!(
                        collection = %collection,
                        tag = %tag,
                        "partition tag matches no partition; ignoring"
                    );
                }
            }
        }

        // BTreeMap iteration keeps the result ordered by id.
        Ok(state
            .segments
            .values()
            .filter(|s| s.collection == collection.name())
            .filter(|s| tags.is_whole_collection() || tags.contains(&s.partition_tag))
            .cloned()
            .collect())
    }
}
