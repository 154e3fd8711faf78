//! Collection metadata: schemas, argument validation, segment enumeration.
//!
//! The lifecycle commands see the catalog only through two traits,
//! [`MetadataAccessor`] and [`SegmentEnumerator`]. [`MemoryCatalog`] is the
//! in-process implementation, populated from a [`CatalogManifest`].

pub mod accessor;
pub mod manifest;
pub mod memory;
pub mod schema;
pub mod segments;
pub mod validation;

pub use accessor::MetadataAccessor;
pub use manifest::CatalogManifest;
pub use memory::MemoryCatalog;
pub use schema::{
    Collection, CollectionSchema, PartitionCollection, PartitionTagSet, RootCollection,
    DEFAULT_PARTITION_TAG,
};
pub use segments::{SegmentDescriptor, SegmentEnumerator, SegmentId};
